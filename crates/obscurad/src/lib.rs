//! Register-mapped capture daemon.
//!
//! `obscurad` exposes a small block of holding registers over a TCP device
//! protocol. A write to the operation register is a *command*: the command
//! gateway validates it against current job state and either dispatches a
//! capture job to the owned worker or rejects it with a closed set of
//! outcomes (`accepted`, `acknowledged`, `illegal_value`, `device_busy`).
//! The job runner executes the capture engine off the protocol path and
//! publishes status and result registers atomically, so polling clients
//! never observe a terminal status with a mismatched result.
//!
//! The crate wires four layers:
//!
//! - `transport`: TCP listener and the wire codec serving register reads
//!   and writes per connection.
//! - `dispatch`: the command gateway and job runner around the shared
//!   register block.
//! - `bootstrap` / [`telemetry`] / `health`: configuration loading,
//!   structured logging, and lifecycle event reporting.
//! - `process`: daemonisation, the singleton runtime guard, and the
//!   signal-driven shutdown sequence.

mod bootstrap;
mod dispatch;
mod health;
mod process;
mod store;
pub mod telemetry;
mod transport;

pub use bootstrap::{
    BootstrapError, ConfigLoader, Daemon, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
};
pub use dispatch::{CommandGateway, JobRunner, JobSender, JobSink, SubmitError};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use process::{LaunchError, LaunchMode, run_daemon};
pub use store::SharedRegisters;
pub use telemetry::{TelemetryError, TelemetryHandle};
