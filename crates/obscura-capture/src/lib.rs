//! Capture engine boundary for the obscura daemon.
//!
//! The daemon drives hardware capture through the [`CaptureEngine`] trait:
//! a single blocking call that records from the configured devices and
//! returns an opaque result or a reason for failure. The production
//! implementation, [`V4l2CaptureEngine`], probes V4L2 device nodes and
//! records by driving an external encoder process; tests substitute
//! scripted engines.

mod engine;
mod v4l2;

pub use engine::{
    CaptureConfig, CaptureEngine, CaptureError, CaptureOutcome, DeviceSelection,
    DeviceSelectionParseError,
};
pub use v4l2::V4l2CaptureEngine;
