//! Transaction lock serialising volt commands that mutate `$VOLTPATH`.
//!
//! The lock is a file created exclusively (`O_EXCL`) holding the owner's PID
//! and command line as JSON. It is removed when the [`TrxLock`] is dropped.
use std::fs::OpenOptions;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::TrxError;

/// Contents of `trx.lock`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockMetadata {
    pub pid: u32,
    pub command: String,
}

/// Held transaction lock. Dropping it releases the lock.
#[derive(Debug)]
pub struct TrxLock {
    lock_path: PathBuf,
}

impl TrxLock {
    /// Take the lock at `lock_path` on behalf of `command`.
    ///
    /// # Errors
    ///
    /// Returns [`TrxError::Locked`] when another process holds the lock, or
    /// [`TrxError::Io`] when the file cannot be created.
    pub fn acquire(lock_path: &Path, command: &str) -> Result<Self, TrxError> {
        let io_err = |source| TrxError::Io {
            lock_path: lock_path.to_path_buf(),
            source,
        };

        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(lock_path)
        {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(read_contention_error(lock_path));
            }
            Err(e) => return Err(io_err(e)),
        };

        let lock = Self {
            lock_path: lock_path.to_path_buf(),
        };

        let metadata = LockMetadata {
            pid: std::process::id(),
            command: command.to_string(),
        };
        let json = serde_json::to_vec(&metadata).map_err(|e| io_err(io::Error::other(e)))?;
        file.write_all(&json).map_err(io_err)?;

        Ok(lock)
    }

    /// Path of the held lock file.
    #[must_use]
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for TrxLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.lock_path) {
            tracing::warn!(
                "failed to remove lock file {}: {e}",
                self.lock_path.display()
            );
        }
    }
}

fn read_contention_error(lock_path: &Path) -> TrxError {
    if let Ok(content) = std::fs::read_to_string(lock_path)
        && let Ok(metadata) = serde_json::from_str::<LockMetadata>(&content)
    {
        return TrxError::Locked {
            command: metadata.command,
            pid: metadata.pid,
            lock_path: lock_path.to_path_buf(),
        };
    }
    TrxError::LockedUnknown {
        lock_path: lock_path.to_path_buf(),
    }
}
