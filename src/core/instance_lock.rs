//! Single-instance run lock
//!
//! Two pollers on the same bot token make Telegram reject both with
//! `Conflict: terminated by other getUpdates request`, so `run` takes an
//! exclusive advisory lock on a well-known file before starting the
//! dispatcher. The lock is released when the guard is dropped or the
//! process exits.

use std::fs::{File, OpenOptions, TryLockError};
use std::path::{Path, PathBuf};

use crate::core::error::AppError;

/// Guard holding the exclusive lock.
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
    // Held for its lock; never read.
    _file: File,
}

impl InstanceLock {
    /// Tries to take the lock without blocking.
    ///
    /// # Errors
    /// * `AppError::AlreadyRunning` - another process holds the lock
    /// * `AppError::Io` - the lock file cannot be opened
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)?;

        match file.try_lock() {
            Ok(()) => {
                log::info!("🔒 Lock acquired: {}", path.display());
                Ok(Self { path, _file: file })
            }
            Err(TryLockError::WouldBlock) => Err(AppError::AlreadyRunning(path.display().to_string())),
            Err(TryLockError::Error(e)) => Err(AppError::Io(e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
