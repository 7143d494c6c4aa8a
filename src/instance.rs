//! Single-instance guard.
//!
//! Two running counters would each hold their own copy of a record and
//! overwrite each other's saves, so the service and the commands that edit
//! records take an exclusive lock on a file in the data directory first.

use std::fs::{File, OpenOptions, TryLockError};
use std::path::{Path, PathBuf};
use tracing::debug;

const LOCK_FILE_NAME: &str = ".mouse-click-counter.lock";

/// Errors from acquiring the instance lock.
#[derive(Debug)]
pub enum InstanceError {
    /// Another process holds the lock
    AlreadyRunning(PathBuf),
    Io(String),
}

impl std::fmt::Display for InstanceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstanceError::AlreadyRunning(path) => write!(
                f,
                "Mouse Click Counter is already running (lock held on {})",
                path.display()
            ),
            InstanceError::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for InstanceError {}

/// Holds the instance lock until dropped.
#[derive(Debug)]
pub struct InstanceGuard {
    _file: File,
    path: PathBuf,
}

impl InstanceGuard {
    /// Take the lock for `data_dir`, creating the directory if needed.
    pub fn acquire(data_dir: &Path) -> Result<Self, InstanceError> {
        std::fs::create_dir_all(data_dir).map_err(|e| InstanceError::Io(e.to_string()))?;
        let path = data_dir.join(LOCK_FILE_NAME);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|e| InstanceError::Io(e.to_string()))?;

        match file.try_lock() {
            Ok(()) => {
                debug!("Acquired instance lock {}", path.display());
                Ok(Self { _file: file, path })
            }
            Err(TryLockError::WouldBlock) => Err(InstanceError::AlreadyRunning(path)),
            Err(TryLockError::Error(e)) => Err(InstanceError::Io(e.to_string())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
