//! Operation codes, job status values, and command write outcomes.

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Work requested by writing the operation register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationCode {
    /// No operation; returns the device to its rest state.
    Ready,
    /// Record from the configured capture devices.
    Capture,
}

impl OperationCode {
    /// Parses a register cell value.
    #[must_use]
    pub const fn from_cell(value: u16) -> Option<Self> {
        match value {
            0 => Some(Self::Ready),
            1 => Some(Self::Capture),
            _ => None,
        }
    }

    /// Cell value written to the operation register.
    #[must_use]
    pub const fn as_cell(self) -> u16 {
        match self {
            Self::Ready => 0,
            Self::Capture => 1,
        }
    }

    /// Canonical lower-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Capture => "capture",
        }
    }
}

impl fmt::Display for OperationCode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Progress of the most recent job, published through the status register.
///
/// A distinct type from [`OperationCode`]: the numeric overlap between
/// `Ready` and `Complete` carries no meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// The last job finished; the device is at rest.
    Complete,
    /// A job is currently executing.
    Working,
    /// The last job failed; the result window is cleared.
    Error,
}

impl JobStatus {
    /// Parses a register cell value.
    #[must_use]
    pub const fn from_cell(value: u16) -> Option<Self> {
        match value {
            0 => Some(Self::Complete),
            1 => Some(Self::Working),
            10 => Some(Self::Error),
            _ => None,
        }
    }

    /// Cell value published to the status register.
    #[must_use]
    pub const fn as_cell(self) -> u16 {
        match self {
            Self::Complete => 0,
            Self::Working => 1,
            Self::Error => 10,
        }
    }

    /// Canonical lower-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Working => "working",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Synchronous verdict on a command write, returned to the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The write was validated and a job dispatched.
    Accepted,
    /// The operation code is already current; no job was dispatched.
    Acknowledged,
    /// The value is not a known operation code; nothing changed.
    IllegalValue,
    /// A job is already running (or queued); nothing changed.
    DeviceBusy,
}

impl WriteOutcome {
    /// Canonical lower-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Acknowledged => "acknowledged",
            Self::IllegalValue => "illegal_value",
            Self::DeviceBusy => "device_busy",
        }
    }
}

impl fmt::Display for WriteOutcome {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// One accepted unit of work, alive from gateway acceptance until the
/// runner publishes its outcome.
#[derive(Debug, Clone, Copy)]
pub struct Job {
    /// The operation to perform.
    pub code: OperationCode,
    /// When the gateway accepted the triggering write.
    pub submitted_at: Instant,
}

impl Job {
    /// Builds a job stamped with the current instant.
    #[must_use]
    pub fn new(code: OperationCode) -> Self {
        Self {
            code,
            submitted_at: Instant::now(),
        }
    }
}
