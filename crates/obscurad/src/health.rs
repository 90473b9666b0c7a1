//! Structured health reporting for daemon lifecycle and job events.

use std::sync::Arc;

use obscura_capture::CaptureError;
use obscura_config::Config;
use obscura_registers::OperationCode;

use crate::bootstrap::BootstrapError;

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked when the gateway accepts a command write.
    fn job_accepted(&self, code: OperationCode);

    /// Invoked when the runner picks a job up.
    fn job_started(&self, code: OperationCode);

    /// Invoked when a job finishes successfully.
    fn job_completed(&self, code: OperationCode);

    /// Invoked when a capture job fails.
    fn job_failed(&self, code: OperationCode, error: &CaptureError);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn job_accepted(&self, code: OperationCode) {
        (**self).job_accepted(code);
    }

    fn job_started(&self, code: OperationCode) {
        (**self).job_started(code);
    }

    fn job_completed(&self, code: OperationCode) {
        (**self).job_completed(code);
    }

    fn job_failed(&self, code: OperationCode, error: &CaptureError) {
        (**self).job_failed(code, error);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: "obscurad::health",
            event = "bootstrap_starting",
            "starting daemon bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: "obscurad::health",
            event = "bootstrap_succeeded",
            listen = %config.listen(),
            log_filter = %config.log_filter(),
            log_format = ?config.log_format(),
            capture_dir = %config.capture_dir,
            "daemon bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: "obscurad::health",
            event = "bootstrap_failed",
            error = %error,
            "daemon bootstrap failed"
        );
    }

    fn job_accepted(&self, code: OperationCode) {
        tracing::info!(
            target: "obscurad::health",
            event = "job_accepted",
            operation = %code,
            "command accepted"
        );
    }

    fn job_started(&self, code: OperationCode) {
        tracing::info!(
            target: "obscurad::health",
            event = "job_started",
            operation = %code,
            "job started"
        );
    }

    fn job_completed(&self, code: OperationCode) {
        tracing::info!(
            target: "obscurad::health",
            event = "job_completed",
            operation = %code,
            "job completed"
        );
    }

    fn job_failed(&self, code: OperationCode, error: &CaptureError) {
        tracing::error!(
            target: "obscurad::health",
            event = "job_failed",
            operation = %code,
            error = %error,
            "job failed"
        );
    }
}
