use camino::Utf8PathBuf;

use obscura_capture::DeviceSelection;

use crate::endpoint::BindEndpoint;
use crate::logging::LogFormat;

/// Default TCP port the register server binds. The registered device
/// protocol port sits below 1024, so the daemon defaults to its
/// unprivileged sibling.
pub const DEFAULT_TCP_PORT: u16 = 1502;

/// Default log filter expression used by the daemon.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default directory receiving capture output.
pub const DEFAULT_CAPTURE_DIR: &str = "./capture";

/// Default number of frames recorded per device.
pub const DEFAULT_CAPTURE_FRAMES: u32 = 10;

/// Default log filter expression used by the daemon.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

/// Default logging format for the daemon.
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Computes the default listener endpoint.
pub fn default_listen_endpoint() -> BindEndpoint {
    BindEndpoint::new("127.0.0.1", DEFAULT_TCP_PORT)
}

/// Default capture output directory.
pub fn default_capture_dir() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_CAPTURE_DIR)
}

/// Default per-device frame count.
pub fn default_capture_frames() -> u32 {
    DEFAULT_CAPTURE_FRAMES
}

/// Default device selection: record from everything probed.
pub fn default_capture_devices() -> DeviceSelection {
    DeviceSelection::All
}
