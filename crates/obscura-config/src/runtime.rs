//! Derives runtime artefact paths used by the daemon supervisor.
//!
//! The runtime directory houses the daemon lock, pid, and health snapshot
//! files. Deriving the layout here keeps lifecycle tooling and the daemon
//! in agreement about where those artefacts live.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[cfg(unix)]
use dirs::runtime_dir;
#[cfg(unix)]
use libc::geteuid;

/// Canonical paths for runtime artefacts written by the daemon.
#[derive(Debug, Clone)]
pub struct RuntimePaths {
    runtime_dir: PathBuf,
    lock_path: PathBuf,
    pid_path: PathBuf,
    health_path: PathBuf,
}

impl RuntimePaths {
    /// Resolves the runtime directory and creates it if missing.
    pub fn resolve() -> Result<Self, RuntimePathsError> {
        let runtime_dir = default_runtime_directory();
        fs::create_dir_all(&runtime_dir).map_err(|source| RuntimePathsError::RuntimeDirectory {
            path: runtime_dir.clone(),
            source,
        })?;
        Ok(Self {
            lock_path: runtime_dir.join("obscurad.lock"),
            pid_path: runtime_dir.join("obscurad.pid"),
            health_path: runtime_dir.join("obscurad.health"),
            runtime_dir,
        })
    }

    /// Derives runtime paths under an explicit directory, primarily for
    /// tests and tooling that sandbox the daemon's artefacts.
    #[must_use]
    pub fn for_directory(dir: impl Into<PathBuf>) -> Self {
        let runtime_dir = dir.into();
        Self {
            lock_path: runtime_dir.join("obscurad.lock"),
            pid_path: runtime_dir.join("obscurad.pid"),
            health_path: runtime_dir.join("obscurad.health"),
            runtime_dir,
        }
    }

    /// Directory holding runtime artefacts.
    pub fn runtime_dir(&self) -> &Path {
        self.runtime_dir.as_path()
    }

    /// Path to the lock file guarding singleton startup.
    pub fn lock_path(&self) -> &Path {
        self.lock_path.as_path()
    }

    /// Path to the PID file.
    pub fn pid_path(&self) -> &Path {
        self.pid_path.as_path()
    }

    /// Path to the health snapshot.
    pub fn health_path(&self) -> &Path {
        self.health_path.as_path()
    }
}

fn default_runtime_directory() -> PathBuf {
    #[cfg(unix)]
    {
        if let Some(mut dir) = runtime_dir() {
            dir.push("obscura");
            return dir;
        }
        let mut dir = env::temp_dir();
        dir.push("obscura");
        dir.push(format!("uid-{}", unsafe { geteuid() }));
        dir
    }

    #[cfg(not(unix))]
    {
        let mut dir = env::temp_dir();
        dir.push("obscura");
        dir
    }
}

/// Errors raised while deriving daemon runtime paths.
#[derive(Debug, Error)]
pub enum RuntimePathsError {
    /// Creating the runtime directory failed.
    #[error("failed to prepare runtime directory '{path}': {source}")]
    RuntimeDirectory {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}
