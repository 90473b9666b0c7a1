//! Job runner: one owned worker thread executing capture jobs serially.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use obscura_capture::{CaptureConfig, CaptureEngine};
use obscura_registers::{Job, JobStatus, OperationCode, RegisterError, encode_result, map};

use crate::health::HealthReporter;
use crate::store::SharedRegisters;

use super::DISPATCH_TARGET;

/// How often the idle worker re-checks the stop flag.
const RECV_POLL: Duration = Duration::from_millis(100);

/// Errors surfaced when submitting a job.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    /// The single-slot queue already holds a pending job.
    #[error("job queue is full")]
    QueueFull,
    /// The runner is stopping and accepts no further jobs.
    #[error("job runner is stopping")]
    Stopped,
}

/// Submission capability handed to the gateway.
#[cfg_attr(test, mockall::automock)]
pub trait JobSink: Send + Sync {
    /// Queues a job without waiting for it to run.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError`] when the queue is full or draining.
    fn submit(&self, job: Job) -> Result<(), SubmitError>;
}

/// Cloneable job submission handle backed by the runner's queue.
#[derive(Debug, Clone)]
pub struct JobSender {
    tx: SyncSender<Job>,
    stopping: Arc<AtomicBool>,
}

impl JobSink for JobSender {
    fn submit(&self, job: Job) -> Result<(), SubmitError> {
        if self.stopping.load(Ordering::SeqCst) {
            return Err(SubmitError::Stopped);
        }
        self.tx.try_send(job).map_err(|error| match error {
            TrySendError::Full(_) => SubmitError::QueueFull,
            TrySendError::Disconnected(_) => SubmitError::Stopped,
        })
    }
}

/// Owns the worker thread that executes jobs one at a time.
///
/// The queue holds at most one job; combined with the gateway's busy
/// rejection this bounds the backlog, and the single worker guarantees no
/// two jobs ever execute concurrently.
pub struct JobRunner {
    worker: Option<thread::JoinHandle<()>>,
    tx: SyncSender<Job>,
    stopping: Arc<AtomicBool>,
    done_rx: Receiver<()>,
}

impl JobRunner {
    /// Spawns the worker bound to the store, engine and capture parameters.
    pub fn start(
        store: SharedRegisters,
        engine: Arc<dyn CaptureEngine>,
        capture: CaptureConfig,
        reporter: Arc<dyn HealthReporter>,
    ) -> Self {
        let (tx, rx) = mpsc::sync_channel(1);
        let (done_tx, done_rx) = mpsc::channel();
        let stopping = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stopping);
        let worker = thread::spawn(move || {
            run_worker(&rx, &stop_flag, &store, engine.as_ref(), &capture, &reporter);
            let _ = done_tx.send(());
        });
        Self {
            worker: Some(worker),
            tx,
            stopping,
            done_rx,
        }
    }

    /// Submission handle for the gateway.
    #[must_use]
    pub fn sender(&self) -> JobSender {
        JobSender {
            tx: self.tx.clone(),
            stopping: Arc::clone(&self.stopping),
        }
    }

    /// Stops intake and waits up to `grace` for the in-flight job.
    ///
    /// If the capture call outlives the grace period the worker is detached
    /// rather than interrupted; killing an encoder mid-write corrupts its
    /// output file.
    pub fn shutdown(mut self, grace: Duration) {
        self.stopping.store(true, Ordering::SeqCst);
        match self.done_rx.recv_timeout(grace) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if let Some(handle) = self.worker.take()
                    && handle.join().is_err()
                {
                    warn!(target: DISPATCH_TARGET, "job worker panicked");
                }
                info!(target: DISPATCH_TARGET, "job runner drained");
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    target: DISPATCH_TARGET,
                    grace_ms = grace.as_millis(),
                    "in-flight job exceeded shutdown grace; detaching worker"
                );
            }
        }
    }
}

impl Drop for JobRunner {
    fn drop(&mut self) {
        self.stopping.store(true, Ordering::SeqCst);
    }
}

fn run_worker(
    rx: &Receiver<Job>,
    stopping: &AtomicBool,
    store: &SharedRegisters,
    engine: &dyn CaptureEngine,
    capture: &CaptureConfig,
    reporter: &Arc<dyn HealthReporter>,
) {
    info!(target: DISPATCH_TARGET, "job worker active");
    loop {
        if stopping.load(Ordering::SeqCst) {
            break;
        }
        match rx.recv_timeout(RECV_POLL) {
            Ok(job) => execute(job, store, engine, capture, reporter),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    info!(target: DISPATCH_TARGET, "job worker stopped");
}

fn execute(
    job: Job,
    store: &SharedRegisters,
    engine: &dyn CaptureEngine,
    capture: &CaptureConfig,
    reporter: &Arc<dyn HealthReporter>,
) {
    reporter.job_started(job.code);
    let publish = match job.code {
        OperationCode::Ready => {
            debug!(target: DISPATCH_TARGET, "returning device to rest state");
            let result = publish_status(store, JobStatus::Complete);
            reporter.job_completed(job.code);
            result
        }
        OperationCode::Capture => run_capture(job, store, engine, capture, reporter),
    };
    if let Err(register_error) = publish {
        // Reserved addresses are always in range; reaching this means the
        // register map constants and block size disagree.
        error!(
            target: DISPATCH_TARGET,
            error = %register_error,
            "failed to publish job outcome"
        );
    }
}

fn run_capture(
    job: Job,
    store: &SharedRegisters,
    engine: &dyn CaptureEngine,
    capture: &CaptureConfig,
    reporter: &Arc<dyn HealthReporter>,
) -> Result<(), RegisterError> {
    publish_status(store, JobStatus::Working)?;
    match engine.capture(capture) {
        Ok(outcome) => {
            info!(
                target: DISPATCH_TARGET,
                files = outcome.files.len(),
                elapsed_ms = job.submitted_at.elapsed().as_millis(),
                "capture job complete"
            );
            reporter.job_completed(job.code);
            publish_outcome(store, &encode_result(&outcome.text), JobStatus::Complete)
        }
        Err(capture_error) => {
            error!(
                target: DISPATCH_TARGET,
                error = %capture_error,
                elapsed_ms = job.submitted_at.elapsed().as_millis(),
                "capture job failed"
            );
            reporter.job_failed(job.code, &capture_error);
            let cleared = vec![0_u16; usize::from(map::RESULT_LEN)];
            publish_outcome(store, &cleared, JobStatus::Error)
        }
    }
}

/// Writes the status cell alone.
fn publish_status(store: &SharedRegisters, status: JobStatus) -> Result<(), RegisterError> {
    store.write(map::STATUS, &[status.as_cell()])
}

/// Writes result cells and then the status cell in one critical section, so
/// a poller observing the terminal status is guaranteed to see the matching
/// result.
fn publish_outcome(
    store: &SharedRegisters,
    result: &[u16],
    status: JobStatus,
) -> Result<(), RegisterError> {
    store.with_block(|block| {
        block.set(map::RESULT, result)?;
        block.set(map::STATUS, &[status.as_cell()])
    })
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::mpsc::Sender;
    use std::thread;

    use camino::Utf8PathBuf;
    use obscura_capture::{CaptureError, CaptureOutcome, DeviceSelection};
    use obscura_registers::RegisterBlock;

    use crate::health::StructuredHealthReporter;

    use super::*;

    /// Engine that replays a scripted sequence of results.
    struct ScriptedEngine {
        script: Mutex<VecDeque<Result<CaptureOutcome, CaptureError>>>,
        started: Option<Sender<()>>,
        release: Option<Mutex<Receiver<()>>>,
    }

    impl ScriptedEngine {
        fn new(script: Vec<Result<CaptureOutcome, CaptureError>>) -> Self {
            Self {
                script: Mutex::new(script.into_iter().collect()),
                started: None,
                release: None,
            }
        }

        fn gated(
            script: Vec<Result<CaptureOutcome, CaptureError>>,
            started: Sender<()>,
            release: Receiver<()>,
        ) -> Self {
            Self {
                script: Mutex::new(script.into_iter().collect()),
                started: Some(started),
                release: Some(Mutex::new(release)),
            }
        }

        fn ok(text: &str) -> Result<CaptureOutcome, CaptureError> {
            Ok(CaptureOutcome {
                files: Vec::new(),
                text: text.to_owned(),
            })
        }
    }

    impl CaptureEngine for ScriptedEngine {
        fn capture(&self, _config: &CaptureConfig) -> Result<CaptureOutcome, CaptureError> {
            if let Some(started) = &self.started {
                let _ = started.send(());
            }
            if let Some(release) = &self.release {
                let receiver = release.lock().expect("release receiver");
                let _ = receiver.recv_timeout(Duration::from_secs(5));
            }
            self.script
                .lock()
                .expect("script")
                .pop_front()
                .unwrap_or(Err(CaptureError::NoDevices))
        }
    }

    fn test_capture_config() -> CaptureConfig {
        CaptureConfig {
            output_dir: Utf8PathBuf::from("/tmp/obscura-test"),
            frames: 1,
            devices: DeviceSelection::All,
        }
    }

    fn start_runner(store: &SharedRegisters, engine: ScriptedEngine) -> JobRunner {
        JobRunner::start(
            store.clone(),
            Arc::new(engine),
            test_capture_config(),
            Arc::new(StructuredHealthReporter::new()),
        )
    }

    fn wait_for_status(store: &SharedRegisters, status: JobStatus) -> bool {
        for _ in 0..200 {
            if store.read(map::STATUS, 1).expect("read status") == vec![status.as_cell()] {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    fn read_result(store: &SharedRegisters) -> Vec<u16> {
        store
            .read(map::RESULT, map::RESULT_LEN)
            .expect("read result window")
    }

    fn wait_for_result(store: &SharedRegisters, expected: &[u16]) -> bool {
        for _ in 0..200 {
            if read_result(store) == expected {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn capture_success_publishes_working_then_result_then_complete() {
        let store = SharedRegisters::new(RegisterBlock::new());
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let engine =
            ScriptedEngine::gated(vec![ScriptedEngine::ok("OK")], started_tx, release_rx);
        let runner = start_runner(&store, engine);

        runner
            .sender()
            .submit(Job::new(OperationCode::Capture))
            .expect("submit");

        started_rx
            .recv_timeout(Duration::from_secs(2))
            .expect("capture starts");
        assert!(wait_for_status(&store, JobStatus::Working));
        // Result window stays untouched while the job is in flight.
        assert!(read_result(&store).iter().all(|cell| *cell == 0));

        let _ = release_tx.send(());
        assert!(wait_for_status(&store, JobStatus::Complete));
        assert_eq!(read_result(&store), encode_result("OK"));

        runner.shutdown(Duration::from_secs(2));
    }

    #[test]
    fn capture_failure_clears_result_and_leaves_worker_alive() {
        let store = SharedRegisters::new(RegisterBlock::new());
        store
            .write(map::RESULT, &encode_result("STALE"))
            .expect("seed stale result");
        let engine = ScriptedEngine::new(vec![
            Err(CaptureError::NoDevices),
            ScriptedEngine::ok("OK"),
        ]);
        let runner = start_runner(&store, engine);
        let sender = runner.sender();

        sender
            .submit(Job::new(OperationCode::Capture))
            .expect("submit failing job");
        assert!(wait_for_status(&store, JobStatus::Error));
        assert!(
            read_result(&store).iter().all(|cell| *cell == 0),
            "result window is cleared on failure"
        );

        // The worker survives and the recovery sequence works: Ready, then
        // a fresh Capture.
        sender
            .submit(Job::new(OperationCode::Ready))
            .expect("submit ready");
        assert!(wait_for_status(&store, JobStatus::Complete));

        sender
            .submit(Job::new(OperationCode::Capture))
            .expect("submit second capture");
        assert!(wait_for_result(&store, &encode_result("OK")));
        assert!(wait_for_status(&store, JobStatus::Complete));

        runner.shutdown(Duration::from_secs(2));
    }

    #[test]
    fn ready_job_resets_status_without_engine_work() {
        let store = SharedRegisters::new(RegisterBlock::new());
        store
            .write(map::STATUS, &[JobStatus::Error.as_cell()])
            .expect("seed error status");
        // An empty script: any capture attempt would publish an error.
        let runner = start_runner(&store, ScriptedEngine::new(Vec::new()));

        runner
            .sender()
            .submit(Job::new(OperationCode::Ready))
            .expect("submit ready");
        assert!(wait_for_status(&store, JobStatus::Complete));

        runner.shutdown(Duration::from_secs(2));
    }

    #[test]
    fn shutdown_with_idle_worker_returns_promptly() {
        let store = SharedRegisters::new(RegisterBlock::new());
        let runner = start_runner(&store, ScriptedEngine::new(Vec::new()));
        let begun = std::time::Instant::now();
        runner.shutdown(Duration::from_secs(5));
        assert!(begun.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn shutdown_detaches_job_exceeding_grace() {
        let store = SharedRegisters::new(RegisterBlock::new());
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let engine =
            ScriptedEngine::gated(vec![ScriptedEngine::ok("OK")], started_tx, release_rx);
        let runner = start_runner(&store, engine);

        runner
            .sender()
            .submit(Job::new(OperationCode::Capture))
            .expect("submit");
        started_rx
            .recv_timeout(Duration::from_secs(2))
            .expect("capture starts");

        let begun = std::time::Instant::now();
        runner.shutdown(Duration::from_millis(100));
        assert!(begun.elapsed() < Duration::from_secs(2));

        // Let the detached worker finish so the test process exits cleanly.
        let _ = release_tx.send(());
    }

    #[test]
    fn sender_rejects_jobs_once_stopping() {
        let store = SharedRegisters::new(RegisterBlock::new());
        let runner = start_runner(&store, ScriptedEngine::new(Vec::new()));
        let sender = runner.sender();
        runner.shutdown(Duration::from_secs(2));

        assert_eq!(
            sender.submit(Job::new(OperationCode::Ready)),
            Err(SubmitError::Stopped)
        );
    }
}
