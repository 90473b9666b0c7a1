//! Capture engine trait, configuration, and error surface.

use std::fmt;
use std::io;
use std::str::FromStr;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which probed devices a capture run records from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DeviceSelection {
    /// Record from every device found.
    All,
    /// Record from the lowest-numbered device only.
    First,
    /// Record from the device with this index only.
    Index(u32),
}

impl DeviceSelection {
    /// Canonical textual form (`all`, `first`, or the bare index).
    #[must_use]
    pub fn as_text(&self) -> String {
        match self {
            Self::All => "all".to_owned(),
            Self::First => "first".to_owned(),
            Self::Index(index) => index.to_string(),
        }
    }
}

impl fmt::Display for DeviceSelection {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.as_text())
    }
}

impl FromStr for DeviceSelection {
    type Err = DeviceSelectionParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "first" => Ok(Self::First),
            other => other
                .parse::<u32>()
                .map(Self::Index)
                .map_err(|_| DeviceSelectionParseError {
                    value: input.to_owned(),
                }),
        }
    }
}

impl TryFrom<String> for DeviceSelection {
    type Error = DeviceSelectionParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DeviceSelection> for String {
    fn from(selection: DeviceSelection) -> Self {
        selection.as_text()
    }
}

/// Error produced when device selection text is not `all`, `first`, or an
/// index.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid device selection '{value}': expected 'all', 'first', or a device index")]
pub struct DeviceSelectionParseError {
    /// The rejected input.
    pub value: String,
}

/// Parameters for one capture run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Directory receiving the recorded files; created if missing.
    pub output_dir: Utf8PathBuf,
    /// Number of frames to record per device.
    pub frames: u32,
    /// Which probed devices to record from.
    pub devices: DeviceSelection,
}

/// Successful capture: the recorded files and the text published to the
/// result window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureOutcome {
    /// Files written by the run, one per recorded device.
    pub files: Vec<Utf8PathBuf>,
    /// ASCII payload for the result register window.
    pub text: String,
}

/// Errors surfaced by a capture run.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Probing found no capture devices.
    #[error("no capture devices found")]
    NoDevices,

    /// The selected device index was not among the probed devices.
    #[error("capture device {index} not found")]
    NoSuchDevice {
        /// Requested device index.
        index: u32,
    },

    /// The output directory could not be created.
    #[error("failed to prepare output directory '{path}': {source}")]
    OutputDir {
        /// Directory that could not be created.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Formatting the capture timestamp failed.
    #[error("failed to format capture timestamp: {source}")]
    Timestamp {
        /// Underlying formatting error.
        #[source]
        source: time::error::Format,
    },

    /// The encoder process could not be spawned.
    #[error("failed to run encoder for device {device}: {source}")]
    Spawn {
        /// Device being recorded.
        device: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },

    /// The encoder process exited unsuccessfully.
    #[error("encoder failed for device {device}: {detail}")]
    Encoder {
        /// Device being recorded.
        device: Utf8PathBuf,
        /// Exit status and trailing diagnostic output.
        detail: String,
    },
}

/// Blocking capture boundary.
///
/// Implementations may take seconds per call; callers must never invoke
/// this on a protocol-handling thread.
pub trait CaptureEngine: Send + Sync {
    /// Records from the configured devices and returns the outcome.
    ///
    /// # Errors
    ///
    /// Returns a [`CaptureError`] describing the first step that failed;
    /// no partial success is reported.
    fn capture(&self, config: &CaptureConfig) -> Result<CaptureOutcome, CaptureError>;
}
