//! RAII lock guard implementation.

use super::types::LockMode;
use crate::error::{CrewError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// RAII guard for a lock marker.
///
/// When dropped, the marker file is deleted. If deletion fails a warning is
/// logged but no panic occurs, so a protected section that returns early or
/// unwinds still releases its lock.
#[derive(Debug)]
pub struct LockGuard {
    /// Path to the marker file (the `.lock` file or a reader marker).
    path: PathBuf,

    mode: LockMode,

    released: bool,
}

impl LockGuard {
    pub(super) fn new(path: PathBuf, mode: LockMode) -> Self {
        Self {
            path,
            mode,
            released: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }

    /// Release the lock before the guard goes out of scope, surfacing errors.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        fs::remove_file(&self.path).map_err(|e| {
            CrewError::Lock(format!(
                "failed to release lock '{}': {}",
                self.path.display(),
                e
            ))
        })
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if !self.released
            && let Err(e) = fs::remove_file(&self.path)
        {
            warn!(path = %self.path.display(), error = %e, "failed to release lock");
        }
    }
}
