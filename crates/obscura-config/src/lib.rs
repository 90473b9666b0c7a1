//! Layered configuration for the obscura daemon.
//!
//! Configuration merges four layers, highest precedence first: CLI flags,
//! `OBSCURA_*` environment variables, a TOML file (`--config-path`), and
//! built-in defaults. The [`Config`] type is the single resolved view the
//! daemon consumes; the supporting types describe the listener endpoint,
//! logging output, and capture parameters.

mod defaults;
mod endpoint;
mod logging;
mod runtime;

use std::ffi::OsString;
use std::sync::Arc;

use camino::Utf8PathBuf;
use ortho_config::{OrthoConfig, OrthoError};
use serde::{Deserialize, Serialize};

use obscura_capture::{CaptureConfig, DeviceSelection};

pub use defaults::{
    DEFAULT_CAPTURE_DIR, DEFAULT_CAPTURE_FRAMES, DEFAULT_LOG_FILTER, DEFAULT_TCP_PORT,
    default_capture_devices, default_capture_dir, default_capture_frames, default_listen_endpoint,
    default_log_filter, default_log_filter_string, default_log_format,
};
pub use endpoint::{BindEndpoint, EndpointParseError};
pub use logging::{LogFormat, LogFormatParseError};
pub use runtime::{RuntimePaths, RuntimePathsError};

/// Resolved daemon configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "OBSCURA")]
pub struct Config {
    /// Endpoint the register server binds.
    #[ortho_config(default = defaults::default_listen_endpoint())]
    pub listen: BindEndpoint,

    /// Tracing filter expression.
    #[ortho_config(default = defaults::default_log_filter_string())]
    pub log_filter: String,

    /// Logging output format.
    #[ortho_config(default = defaults::default_log_format())]
    pub log_format: LogFormat,

    /// Directory receiving capture output.
    #[ortho_config(default = defaults::default_capture_dir())]
    pub capture_dir: Utf8PathBuf,

    /// Frames recorded per device per capture run.
    #[ortho_config(default = defaults::default_capture_frames())]
    pub capture_frames: u32,

    /// Which probed devices a capture run records from.
    #[ortho_config(default = defaults::default_capture_devices())]
    pub capture_devices: DeviceSelection,
}

impl Config {
    /// Loads configuration from process arguments, environment, and file.
    ///
    /// # Errors
    ///
    /// Returns the aggregated loader error when any layer fails to parse.
    pub fn load() -> Result<Self, Arc<OrthoError>> {
        <Self as OrthoConfig>::load()
    }

    /// Loads configuration from the supplied argument iterator.
    ///
    /// # Errors
    ///
    /// Returns the aggregated loader error when any layer fails to parse.
    pub fn load_from_iter<I, T>(args: I) -> Result<Self, Arc<OrthoError>>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as OrthoConfig>::load_from_iter(args)
    }

    /// Endpoint the register server binds.
    #[must_use]
    pub fn listen(&self) -> &BindEndpoint {
        &self.listen
    }

    /// Tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Logging output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Capture parameters assembled for the capture engine.
    #[must_use]
    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            output_dir: self.capture_dir.clone(),
            frames: self.capture_frames,
            devices: self.capture_devices,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: defaults::default_listen_endpoint(),
            log_filter: defaults::default_log_filter_string(),
            log_format: defaults::default_log_format(),
            capture_dir: defaults::default_capture_dir(),
            capture_frames: defaults::default_capture_frames(),
            capture_devices: defaults::default_capture_devices(),
        }
    }
}
