//! Register-protocol vocabulary shared by the daemon and its clients.
//!
//! The crate defines the holding-register block served over the wire, the
//! reserved register map, and the enumerations exchanged through it: the
//! operation codes clients write to request work, the job status values the
//! daemon publishes, and the closed set of outcomes a command write can
//! produce. Types here carry no concurrency control and no transport
//! knowledge; both belong to the daemon.

mod block;
mod codes;

pub use block::{RegisterBlock, RegisterError, encode_result, map};
pub use codes::{Job, JobStatus, OperationCode, WriteOutcome};
