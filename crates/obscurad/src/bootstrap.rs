//! Daemon bootstrap orchestration.

use std::sync::Arc;

use ortho_config::OrthoError;
use thiserror::Error;

use obscura_config::Config;
use obscura_registers::RegisterBlock;

use crate::health::HealthReporter;
use crate::store::SharedRegisters;
use crate::telemetry::{self, TelemetryError, TelemetryHandle};

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the daemon configuration.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader that returns an already-resolved configuration.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps a resolved configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
}

/// Result of a successful bootstrap invocation.
pub struct Daemon {
    config: Config,
    store: SharedRegisters,
    telemetry: TelemetryHandle,
}

impl Daemon {
    fn new(config: Config, store: SharedRegisters, telemetry: TelemetryHandle) -> Self {
        Self {
            config,
            store,
            telemetry,
        }
    }

    /// Accessor for the resolved configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Handle to the register block seeded with initial values.
    #[must_use]
    pub fn store(&self) -> SharedRegisters {
        self.store.clone()
    }

    /// Accessor for the telemetry handle, primarily useful for testing.
    #[must_use]
    pub fn telemetry(&self) -> TelemetryHandle {
        self.telemetry
    }
}

/// Bootstraps the daemon using the supplied collaborators: loads
/// configuration, installs telemetry, and seeds the register block.
pub fn bootstrap_with(
    loader: &dyn ConfigLoader,
    reporter: &Arc<dyn HealthReporter>,
) -> Result<Daemon, BootstrapError> {
    reporter.bootstrap_starting();

    let config = match loader.load() {
        Ok(config) => config,
        Err(source) => {
            let error = BootstrapError::Configuration { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    let telemetry = match telemetry::initialise(&config) {
        Ok(handle) => handle,
        Err(source) => {
            let error = BootstrapError::Telemetry { source };
            reporter.bootstrap_failed(&error);
            return Err(error);
        }
    };

    let store = SharedRegisters::new(RegisterBlock::new());
    reporter.bootstrap_succeeded(&config);

    Ok(Daemon::new(config, store, telemetry))
}
