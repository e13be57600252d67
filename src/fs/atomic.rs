//! Atomic filesystem writes for crewfs.
//!
//! Shared documents are never written in place. Every write follows:
//! 1. Write content to a uniquely named temporary file in the same directory
//! 2. Sync the file to disk (fsync)
//! 3. Rename it over the target
//!
//! A reader therefore observes either the complete old document or the
//! complete new one. If anything fails before the rename, the temporary file
//! is removed and the target is left byte-for-byte unchanged.
//!
//! Source and destination must be on the same filesystem for the rename to be
//! atomic, which holds because the temp file is a sibling of the target. A
//! crash may leave a `.{filename}.{suffix}.tmp` file behind; it is never read.

use crate::error::{CrewError, Result};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// A temporary file holding the next version of a target document.
///
/// Nothing is visible at the target until [`StagedWrite::commit`] succeeds.
/// Dropping an uncommitted stage deletes the temporary file.
#[derive(Debug)]
pub struct StagedWrite {
    temp_path: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl StagedWrite {
    /// Write `content` to a synced sibling temp file of `target`.
    pub fn stage<P: AsRef<Path>>(target: P, content: &[u8]) -> Result<Self> {
        let target = target.as_ref();

        if let Some(parent) = target.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| {
                CrewError::Io(format!(
                    "failed to create parent directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let temp_path = generate_temp_path(target)?;
        let staged = Self {
            temp_path,
            target: target.to_path_buf(),
            committed: false,
        };
        // On error `staged` drops here and removes whatever was written.
        write_and_sync(&staged.temp_path, content)?;
        Ok(staged)
    }

    /// Path of the temporary file.
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Atomically replace the target with the staged content.
    pub fn commit(mut self) -> Result<()> {
        atomic_replace(&self.temp_path, &self.target)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for StagedWrite {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.temp_path);
        }
    }
}

/// Atomically write bytes to a file.
///
/// ```no_run
/// use crewfs::fs::atomic_write;
/// use std::path::Path;
///
/// atomic_write(Path::new("team.json"), b"{}")?;
/// # Ok::<(), crewfs::error::CrewError>(())
/// ```
pub fn atomic_write<P: AsRef<Path>>(path: P, content: &[u8]) -> Result<()> {
    StagedWrite::stage(path, content)?.commit()
}

/// Generate a unique temporary file path in the same directory as the target.
///
/// The random suffix keeps concurrent writers of the same target from
/// truncating each other's temp files.
fn generate_temp_path(target: &Path) -> Result<PathBuf> {
    let parent = target.parent().unwrap_or(Path::new("."));
    let filename = target
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            CrewError::Io(format!("invalid file path '{}'", target.display()))
        })?;

    let suffix = uuid::Uuid::new_v4().simple().to_string();
    Ok(parent.join(format!(".{}.{}.tmp", filename, &suffix[..12])))
}

fn write_and_sync(path: &Path, content: &[u8]) -> Result<()> {
    let mut file = File::create_new(path).map_err(|e| {
        CrewError::Io(format!(
            "failed to create temporary file '{}': {}",
            path.display(),
            e
        ))
    })?;

    file.write_all(content)
        .map_err(|e| CrewError::Io(format!("failed to write to temporary file: {}", e)))?;

    file.sync_all()
        .map_err(|e| CrewError::Io(format!("failed to sync temporary file to disk: {}", e)))?;

    Ok(())
}

/// Rename `source` over `target`.
///
/// `std::fs::rename` replaces an existing destination on both POSIX and
/// Windows (where it maps to `MoveFileExW` with `MOVEFILE_REPLACE_EXISTING`).
fn atomic_replace(source: &Path, target: &Path) -> Result<()> {
    fs::rename(source, target).map_err(|e| {
        CrewError::Io(format!(
            "failed to atomically replace '{}': {}",
            target.display(),
            e
        ))
    })?;

    // Persist the directory entry as well.
    #[cfg(unix)]
    if let Some(parent) = target.parent()
        && let Ok(dir) = File::open(parent)
    {
        let _ = dir.sync_all();
    }

    Ok(())
}
