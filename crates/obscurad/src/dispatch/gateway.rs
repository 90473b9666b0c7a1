//! Command gateway: validates operation writes and dispatches jobs.

use std::sync::Arc;

use tracing::debug;

use obscura_registers::{Job, JobStatus, OperationCode, RegisterError, WriteOutcome, map};

use crate::health::HealthReporter;
use crate::store::SharedRegisters;

use super::DISPATCH_TARGET;
use super::runner::JobSink;

/// Intercepts writes to the operation register and turns them into
/// validated dispatch decisions; every other access passes through to the
/// store unchanged.
///
/// The decision sequence for a command write — read current state, decide,
/// submit, record the new operation code — runs inside one lock
/// acquisition, so two concurrent writers can never both observe an idle
/// device and both dispatch (a race the field deployments of this protocol
/// did not always close).
pub struct CommandGateway {
    store: SharedRegisters,
    jobs: Arc<dyn JobSink>,
    reporter: Arc<dyn HealthReporter>,
}

impl CommandGateway {
    /// Builds a gateway over the shared store and a job submission
    /// capability.
    pub fn new(
        store: SharedRegisters,
        jobs: Arc<dyn JobSink>,
        reporter: Arc<dyn HealthReporter>,
    ) -> Self {
        Self {
            store,
            jobs,
            reporter,
        }
    }

    /// Reads registers with no side effects.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::OutOfRange`] for ranges outside the block.
    pub fn read(&self, address: u16, count: u16) -> Result<Vec<u16>, RegisterError> {
        self.store.read(address, count)
    }

    /// Applies a register write, intercepting commands.
    ///
    /// Writes whose start address is not the operation register delegate to
    /// the store and report `Accepted`. A write starting at the operation
    /// register is a command carrying its first cell; on acceptance only
    /// the operation cell is persisted, so a command can never clobber the
    /// status or result windows.
    ///
    /// # Errors
    ///
    /// Returns [`RegisterError::OutOfRange`] for ranges outside the block.
    pub fn write(&self, address: u16, values: &[u16]) -> Result<WriteOutcome, RegisterError> {
        if address != map::OP {
            self.store.write(address, values)?;
            return Ok(WriteOutcome::Accepted);
        }

        let Some(&requested) = values.first() else {
            return Ok(WriteOutcome::IllegalValue);
        };

        let outcome = self.store.with_block(|block| {
            let prev = block.get(map::OP, 1)?.first().copied().unwrap_or_default();
            if requested == prev {
                return Ok(WriteOutcome::Acknowledged);
            }

            let Some(code) = OperationCode::from_cell(requested) else {
                return Ok(WriteOutcome::IllegalValue);
            };

            let status = block
                .get(map::STATUS, 1)?
                .first()
                .copied()
                .and_then(JobStatus::from_cell);
            if code == OperationCode::Capture && status == Some(JobStatus::Working) {
                return Ok(WriteOutcome::DeviceBusy);
            }

            match self.jobs.submit(Job::new(code)) {
                Ok(()) => {
                    block.set(map::OP, &[requested])?;
                    Ok(WriteOutcome::Accepted)
                }
                // A full (or draining) queue means a job is still pending;
                // same answer as an observed busy status.
                Err(_) => Ok(WriteOutcome::DeviceBusy),
            }
        })?;

        debug!(
            target: DISPATCH_TARGET,
            value = requested,
            outcome = %outcome,
            "command write"
        );
        if outcome == WriteOutcome::Accepted
            && let Some(code) = OperationCode::from_cell(requested)
        {
            self.reporter.job_accepted(code);
        }
        Ok(outcome)
    }
}
