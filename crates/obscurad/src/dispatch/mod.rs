//! Command dispatch: the gateway/runner bridge between register writes and
//! capture jobs.
//!
//! A register write targeting the operation register is a *command*. The
//! [`CommandGateway`] validates it against the current register state and
//! either hands a job to the [`JobRunner`] or rejects it with one of the
//! closed write outcomes. The runner executes jobs one at a time on its own
//! worker thread and publishes status and result back into the register
//! block. Everything else the gateway sees passes straight through to the
//! store.

mod gateway;
mod runner;

pub use gateway::CommandGateway;
pub use runner::{JobRunner, JobSender, JobSink, SubmitError};

/// Tracing target for dispatch operations.
pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");

#[cfg(test)]
mod tests {
    //! Gateway and runner working together under contention.

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc::{Receiver, SyncSender};
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    use camino::Utf8PathBuf;
    use obscura_capture::{
        CaptureConfig, CaptureEngine, CaptureError, CaptureOutcome, DeviceSelection,
    };
    use obscura_registers::{JobStatus, OperationCode, RegisterBlock, WriteOutcome, map};

    use crate::health::StructuredHealthReporter;
    use crate::store::SharedRegisters;

    use super::*;

    /// Engine that signals when a capture starts and blocks until released.
    struct BlockingEngine {
        started: SyncSender<()>,
        release: Mutex<Receiver<()>>,
        calls: AtomicUsize,
    }

    impl BlockingEngine {
        fn new(started: SyncSender<()>, release: Receiver<()>) -> Self {
            Self {
                started,
                release: Mutex::new(release),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl CaptureEngine for BlockingEngine {
        fn capture(&self, _config: &CaptureConfig) -> Result<CaptureOutcome, CaptureError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let _ = self.started.send(());
            let release = self.release.lock().expect("release receiver");
            let _ = release.recv_timeout(Duration::from_secs(5));
            Ok(CaptureOutcome {
                files: Vec::new(),
                text: "OK".to_owned(),
            })
        }
    }

    fn test_capture_config() -> CaptureConfig {
        CaptureConfig {
            output_dir: Utf8PathBuf::from("/tmp/obscura-test"),
            frames: 1,
            devices: DeviceSelection::All,
        }
    }

    fn wait_for_status(store: &SharedRegisters, status: JobStatus) -> bool {
        for _ in 0..200 {
            let cells = store.read(map::STATUS, 1).expect("read status");
            if cells == vec![status.as_cell()] {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn concurrent_capture_writers_dispatch_exactly_one_job() {
        let store = SharedRegisters::new(RegisterBlock::new());
        let (started_tx, started_rx) = std::sync::mpsc::sync_channel(1);
        let (release_tx, release_rx) = std::sync::mpsc::channel();
        let engine = Arc::new(BlockingEngine::new(started_tx, release_rx));
        let reporter = Arc::new(StructuredHealthReporter::new());

        let runner = JobRunner::start(
            store.clone(),
            Arc::clone(&engine) as Arc<dyn CaptureEngine>,
            test_capture_config(),
            reporter.clone(),
        );
        let gateway = Arc::new(CommandGateway::new(
            store.clone(),
            Arc::new(runner.sender()),
            reporter,
        ));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let gateway = Arc::clone(&gateway);
            handles.push(thread::spawn(move || {
                gateway
                    .write(map::OP, &[OperationCode::Capture.as_cell()])
                    .expect("command write")
            }));
        }

        let outcomes: Vec<WriteOutcome> = handles
            .into_iter()
            .map(|handle| handle.join().expect("writer thread"))
            .collect();

        let accepted = outcomes
            .iter()
            .filter(|outcome| **outcome == WriteOutcome::Accepted)
            .count();
        assert_eq!(accepted, 1, "exactly one writer wins: {outcomes:?}");
        assert!(
            outcomes.iter().all(|outcome| matches!(
                outcome,
                WriteOutcome::Accepted | WriteOutcome::Acknowledged | WriteOutcome::DeviceBusy
            )),
            "losers see acknowledge or busy: {outcomes:?}"
        );

        started_rx
            .recv_timeout(Duration::from_secs(2))
            .expect("capture starts");
        let _ = release_tx.send(());
        assert!(wait_for_status(&store, JobStatus::Complete));
        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);

        runner.shutdown(Duration::from_secs(2));
    }
}
