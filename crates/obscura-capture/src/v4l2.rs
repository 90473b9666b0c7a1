//! Process-backed capture from V4L2 device nodes.
//!
//! Mirrors the field setup this replaces: probe the first ten video device
//! indices, then record a bounded number of frames from each selected
//! device into a timestamped container file. Encoding is delegated to an
//! external `ffmpeg` process; the engine only assembles arguments and
//! interprets exit status.

use std::process::Command;

use camino::{Utf8Path, Utf8PathBuf};
use time::OffsetDateTime;
use time::macros::format_description;
use tracing::{debug, info, warn};

use crate::engine::{
    CaptureConfig, CaptureEngine, CaptureError, CaptureOutcome, DeviceSelection,
};

/// Highest device index probed, exclusive.
const PROBE_LIMIT: u32 = 10;

/// Result text published after a fully successful run.
const RESULT_OK: &str = "OK";

/// Capture engine that records from `/dev/video*` nodes via an external
/// encoder process.
#[derive(Debug, Clone)]
pub struct V4l2CaptureEngine {
    device_root: Utf8PathBuf,
    encoder: String,
}

impl V4l2CaptureEngine {
    /// Builds an engine probing `/dev` and encoding with `ffmpeg`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            device_root: Utf8PathBuf::from("/dev"),
            encoder: "ffmpeg".to_owned(),
        }
    }

    /// Overrides the directory probed for `video*` nodes.
    #[must_use]
    pub fn with_device_root(mut self, root: impl Into<Utf8PathBuf>) -> Self {
        self.device_root = root.into();
        self
    }

    /// Overrides the encoder binary.
    #[must_use]
    pub fn with_encoder(mut self, encoder: impl Into<String>) -> Self {
        self.encoder = encoder.into();
        self
    }

    /// Probes device indices `0..PROBE_LIMIT` and returns those present.
    fn probe(&self) -> Vec<(u32, Utf8PathBuf)> {
        let mut devices = Vec::new();
        for index in 0..PROBE_LIMIT {
            let node = self.device_root.join(format!("video{index}"));
            if node.as_std_path().exists() {
                debug!(device = %node, "capture device found");
                devices.push((index, node));
            }
        }
        devices
    }

    /// Applies the configured device selection to the probe result.
    fn select(
        probed: Vec<(u32, Utf8PathBuf)>,
        selection: DeviceSelection,
    ) -> Result<Vec<(u32, Utf8PathBuf)>, CaptureError> {
        if probed.is_empty() {
            return Err(CaptureError::NoDevices);
        }
        match selection {
            DeviceSelection::All => Ok(probed),
            DeviceSelection::First => Ok(probed.into_iter().take(1).collect()),
            DeviceSelection::Index(index) => {
                let found: Vec<_> = probed
                    .into_iter()
                    .filter(|(probed_index, _)| *probed_index == index)
                    .collect();
                if found.is_empty() {
                    Err(CaptureError::NoSuchDevice { index })
                } else {
                    Ok(found)
                }
            }
        }
    }

    /// Records one device into `output`, waiting for the encoder to exit.
    fn record(&self, device: &Utf8Path, frames: u32, output: &Utf8Path) -> Result<(), CaptureError> {
        info!(device = %device, frames, output = %output, "recording capture device");
        let result = Command::new(&self.encoder)
            .arg("-y")
            .args(["-f", "v4l2"])
            .args(["-i", device.as_str()])
            .args(["-frames:v", &frames.to_string()])
            .arg(output.as_str())
            .output()
            .map_err(|source| CaptureError::Spawn {
                device: device.to_path_buf(),
                source,
            })?;

        if result.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let lines: Vec<&str> = stderr.lines().collect();
            let start = lines.len().saturating_sub(3);
            let tail = lines.get(start..).unwrap_or_default().join("; ");
            warn!(device = %device, status = %result.status, "encoder exited unsuccessfully");
            Err(CaptureError::Encoder {
                device: device.to_path_buf(),
                detail: format!("{} ({tail})", result.status),
            })
        }
    }
}

impl Default for V4l2CaptureEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureEngine for V4l2CaptureEngine {
    fn capture(&self, config: &CaptureConfig) -> Result<CaptureOutcome, CaptureError> {
        let devices = Self::select(self.probe(), config.devices)?;

        std::fs::create_dir_all(config.output_dir.as_std_path()).map_err(|source| {
            CaptureError::OutputDir {
                path: config.output_dir.clone(),
                source,
            }
        })?;

        let stamp_format = format_description!("[year][month][day]-[hour][minute][second]");
        let stamp = OffsetDateTime::now_utc()
            .format(&stamp_format)
            .map_err(|source| CaptureError::Timestamp { source })?;

        let mut files = Vec::with_capacity(devices.len());
        for (index, device) in devices {
            let output = config.output_dir.join(format!("{stamp}-video{index}.mp4"));
            self.record(&device, config.frames, &output)?;
            files.push(output);
        }

        info!(count = files.len(), "capture run complete");
        Ok(CaptureOutcome {
            files,
            text: RESULT_OK.to_owned(),
        })
    }
}
