//! Supervises daemon launch sequencing and runtime orchestration.

use std::env;
use std::sync::Arc;

use tracing::info;

use obscura_capture::{CaptureEngine, V4l2CaptureEngine};
use obscura_config::RuntimePaths;

use crate::bootstrap::{ConfigLoader, StaticConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::dispatch::{CommandGateway, JobRunner};
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::transport::{ProtocolConnectionHandler, SocketListener};

use super::daemonizer::{Daemonizer, SystemDaemonizer};
use super::errors::LaunchError;
use super::guard::{HealthState, ProcessGuard};
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};
use super::{FOREGROUND_ENV_VAR, PROCESS_TARGET, SHUTDOWN_TIMEOUT};

/// Launch mode for the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// Fork into the background and detach from the controlling terminal.
    Background,
    /// Remain attached to the terminal; primarily used for debugging and
    /// tests.
    Foreground,
}

impl LaunchMode {
    fn detect() -> Self {
        if env::var_os(FOREGROUND_ENV_VAR).is_some() {
            Self::Foreground
        } else {
            Self::Background
        }
    }
}

/// Process-level collaborators needed to control daemon lifecycle.
pub(crate) struct ProcessControl<D, S> {
    pub(crate) mode: LaunchMode,
    pub(crate) daemonizer: D,
    pub(crate) shutdown: S,
}

/// Service dependencies required to construct the daemon runtime.
pub(crate) struct ServiceDeps<L> {
    pub(crate) loader: L,
    pub(crate) engine: Arc<dyn CaptureEngine>,
    pub(crate) reporter: Arc<dyn HealthReporter>,
}

/// Collaborators required to launch the daemon runtime.
pub(crate) struct LaunchPlan<L, D, S> {
    pub(crate) process: ProcessControl<D, S>,
    pub(crate) services: ServiceDeps<L>,
}

/// Runs the daemon using the production collaborators.
pub fn run_daemon() -> Result<(), LaunchError> {
    let mode = LaunchMode::detect();
    let reporter = Arc::new(StructuredHealthReporter::new());
    let daemonizer = SystemDaemonizer::new();
    let shutdown = SystemShutdownSignal::new(SHUTDOWN_TIMEOUT);
    let plan = LaunchPlan {
        process: ProcessControl {
            mode,
            daemonizer,
            shutdown,
        },
        services: ServiceDeps {
            loader: SystemConfigLoader,
            engine: Arc::new(V4l2CaptureEngine::new()),
            reporter,
        },
    };
    run_daemon_with(plan)
}

/// Runs the daemon with injected collaborators.
///
/// The startup order is load-bearing: the job runner's worker starts before
/// the listener accepts its first connection, and on shutdown the listener
/// drains before the runner does.
pub(crate) fn run_daemon_with<L, D, S>(plan: LaunchPlan<L, D, S>) -> Result<(), LaunchError>
where
    L: ConfigLoader,
    D: Daemonizer,
    S: ShutdownSignal,
{
    let LaunchPlan { process, services } = plan;
    let ProcessControl {
        mode,
        daemonizer,
        shutdown,
    } = process;
    let ServiceDeps {
        loader,
        engine,
        reporter,
    } = services;

    info!(
        target: PROCESS_TARGET,
        ?mode,
        "starting daemon runtime"
    );
    let config = loader.load()?;
    let runtime_paths = RuntimePaths::resolve()?;
    let mut guard = ProcessGuard::acquire(runtime_paths)?;
    if matches!(mode, LaunchMode::Background) {
        daemonizer.daemonize(guard.paths())?;
    }
    let pid = std::process::id();
    guard.write_pid(pid)?;
    guard.write_health(HealthState::Starting)?;

    let static_loader = StaticConfigLoader::new(config.clone());
    let daemon = bootstrap_with(&static_loader, &reporter)?;
    let store = daemon.store();

    let runner = JobRunner::start(
        store.clone(),
        engine,
        config.capture_config(),
        Arc::clone(&reporter),
    );
    let gateway = CommandGateway::new(store, Arc::new(runner.sender()), Arc::clone(&reporter));
    let handler = Arc::new(ProtocolConnectionHandler::new(gateway));

    let listener = SocketListener::bind(config.listen())?;
    let listener_handle = listener.start(handler)?;
    guard.write_health(HealthState::Ready)?;

    shutdown.wait()?;

    guard.write_health(HealthState::Stopping)?;
    listener_handle.shutdown();
    listener_handle.join()?;
    runner.shutdown(SHUTDOWN_TIMEOUT);
    info!(
        target: PROCESS_TARGET,
        "shutdown sequence completed"
    );
    Ok(())
}
