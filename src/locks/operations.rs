//! Lock acquisition, listing, and clearing operations.

use super::guard::LockGuard;
use super::metadata::LockMetadata;
use super::types::{LockInfo, LockMode};
use crate::error::{CrewError, Result};
use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

const LOCK_SUFFIX: &str = ".lock";
const READERS_SUFFIX: &str = ".lock.readers";

/// Tuning for lock acquisition.
#[derive(Debug, Clone)]
pub struct LockOptions {
    /// Sleep between acquisition attempts.
    pub poll_interval: Duration,

    /// Markers older than this many minutes are reclaimed.
    pub stale_minutes: u32,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
            stale_minutes: 120,
        }
    }
}

/// Path of the exclusive marker co-located with `resource`.
pub fn lock_path_for(resource: &Path) -> PathBuf {
    with_suffix(resource, LOCK_SUFFIX)
}

/// Directory holding shared-holder markers for `resource`.
pub fn readers_dir_for(resource: &Path) -> PathBuf {
    with_suffix(resource, READERS_SUFFIX)
}

fn with_suffix(resource: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = resource.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Advisory lock manager over marker files.
///
/// An exclusive holder owns `<resource>.lock`, created with `create_new`
/// semantics. Shared holders each own a marker in `<resource>.lock.readers/`.
/// An exclusive acquirer claims the `.lock` marker first and then waits for
/// the readers directory to drain; a shared acquirer registers its marker and
/// then re-checks that no `.lock` marker exists, backing off if one does.
/// Either way, once both steps succeed no conflicting holder can exist.
#[derive(Debug, Clone, Default)]
pub struct LockManager {
    options: LockOptions,
}

impl LockManager {
    pub fn new(options: LockOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &LockOptions {
        &self.options
    }

    /// Acquire a lock on `resource`, blocking until it is granted.
    ///
    /// Returns `CrewError::Lock` only when the filesystem refuses the marker
    /// operations; contention is waited out.
    pub fn acquire(&self, resource: &Path, mode: LockMode, action: &str) -> Result<LockGuard> {
        loop {
            let attempt = match mode {
                LockMode::Exclusive => self.acquire_exclusive(resource, action, true)?,
                LockMode::Shared => self.try_shared_once(resource, action)?,
            };
            if let Some(guard) = attempt {
                return Ok(guard);
            }
            thread::sleep(self.options.poll_interval);
        }
    }

    /// Try to acquire a lock without waiting.
    ///
    /// Returns `Ok(None)` when another holder conflicts.
    pub fn try_acquire(
        &self,
        resource: &Path,
        mode: LockMode,
        action: &str,
    ) -> Result<Option<LockGuard>> {
        match mode {
            LockMode::Exclusive => self.acquire_exclusive(resource, action, false),
            LockMode::Shared => self.try_shared_once(resource, action),
        }
    }

    fn acquire_exclusive(
        &self,
        resource: &Path,
        action: &str,
        block: bool,
    ) -> Result<Option<LockGuard>> {
        let lock_path = lock_path_for(resource);
        let metadata = LockMetadata::new(LockMode::Exclusive, action);

        loop {
            if create_marker(&lock_path, &metadata)? {
                break;
            }
            self.reclaim_if_stale(&lock_path);
            if !block {
                return Ok(None);
            }
            thread::sleep(self.options.poll_interval);
        }

        // From here on, dropping the guard releases the marker on any error.
        let guard = LockGuard::new(lock_path, LockMode::Exclusive);
        let readers_dir = readers_dir_for(resource);

        loop {
            if self.live_readers(&readers_dir)? == 0 {
                debug!(resource = %resource.display(), action, "exclusive lock acquired");
                return Ok(Some(guard));
            }
            if !block {
                return Ok(None);
            }
            thread::sleep(self.options.poll_interval);
        }
    }

    fn try_shared_once(&self, resource: &Path, action: &str) -> Result<Option<LockGuard>> {
        let lock_path = lock_path_for(resource);
        if lock_path.exists() {
            self.reclaim_if_stale(&lock_path);
            return Ok(None);
        }

        let readers_dir = readers_dir_for(resource);
        fs::create_dir_all(&readers_dir).map_err(|e| {
            CrewError::Lock(format!(
                "failed to create readers directory '{}': {}",
                readers_dir.display(),
                e
            ))
        })?;

        let reader_path = readers_dir.join(format!(
            "{}-{}.json",
            std::process::id(),
            uuid::Uuid::new_v4().simple()
        ));
        let metadata = LockMetadata::new(LockMode::Shared, action);
        if !create_marker(&reader_path, &metadata)? {
            return Ok(None);
        }
        let guard = LockGuard::new(reader_path, LockMode::Shared);

        // A writer that slipped in between our check and our registration
        // wins; back off and let it finish.
        if lock_path.exists() {
            drop(guard);
            return Ok(None);
        }

        debug!(resource = %resource.display(), action, "shared lock acquired");
        Ok(Some(guard))
    }

    /// Count reader markers, reclaiming stale ones.
    fn live_readers(&self, readers_dir: &Path) -> Result<usize> {
        let entries = match fs::read_dir(readers_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(CrewError::Lock(format!(
                    "failed to read readers directory '{}': {}",
                    readers_dir.display(),
                    e
                )));
            }
        };

        let mut live = 0;
        for entry in entries {
            let entry = entry.map_err(|e| {
                CrewError::Lock(format!("failed to read readers directory entry: {}", e))
            })?;
            let path = entry.path();
            if self.reclaim_if_stale(&path) {
                continue;
            }
            if path.exists() {
                live += 1;
            }
        }
        Ok(live)
    }

    /// Remove a marker whose holder has exceeded the stale threshold.
    ///
    /// Returns true if the marker was reclaimed.
    fn reclaim_if_stale(&self, marker: &Path) -> bool {
        if !marker_is_stale(marker, self.options.stale_minutes) {
            return false;
        }
        match fs::remove_file(marker) {
            Ok(()) => {
                warn!(marker = %marker.display(), "reclaimed stale lock marker");
                true
            }
            Err(_) => false,
        }
    }
}

/// Exclusively create a marker file holding `metadata`.
///
/// Returns `Ok(false)` if the marker already exists.
fn create_marker(path: &Path, metadata: &LockMetadata) -> Result<bool> {
    if let Some(parent) = path.parent()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|e| {
            CrewError::Lock(format!(
                "failed to create lock directory '{}': {}",
                parent.display(),
                e
            ))
        })?;
    }

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => {
            return Err(CrewError::Lock(format!(
                "failed to acquire lock '{}': {}",
                path.display(),
                e
            )));
        }
    };

    let json = metadata.to_json()?;
    if let Err(e) = file.write_all(json.as_bytes()).and_then(|_| file.sync_all()) {
        let _ = fs::remove_file(path);
        return Err(CrewError::Lock(format!("failed to write lock metadata: {}", e)));
    }

    Ok(true)
}

/// A marker is stale when its recorded age exceeds the threshold. A marker
/// whose metadata is not yet written or unreadable falls back to its mtime.
fn marker_is_stale(marker: &Path, stale_minutes: u32) -> bool {
    if let Ok(metadata) = LockMetadata::from_file(marker) {
        return metadata.is_stale(stale_minutes);
    }
    let Ok(modified) = fs::metadata(marker).and_then(|m| m.modified()) else {
        return false;
    };
    SystemTime::now()
        .duration_since(modified)
        .map(|age| age > Duration::from_secs(u64::from(stale_minutes) * 60))
        .unwrap_or(false)
}

/// List all active lock markers below `root`.
pub fn list_locks(root: &Path, stale_minutes: u32) -> Result<Vec<LockInfo>> {
    let mut locks = Vec::new();
    if root.exists() {
        collect_locks(root, stale_minutes, &mut locks)?;
    }
    locks.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(locks)
}

fn collect_locks(dir: &Path, stale_minutes: u32, out: &mut Vec<LockInfo>) -> Result<()> {
    let entries = fs::read_dir(dir).map_err(|e| {
        CrewError::Io(format!("failed to read directory '{}': {}", dir.display(), e))
    })?;

    for entry in entries {
        let entry =
            entry.map_err(|e| CrewError::Io(format!("failed to read directory entry: {}", e)))?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();

        if path.is_dir() {
            if let Some(resource) = name.strip_suffix(READERS_SUFFIX) {
                let resource = dir.join(resource);
                for reader in fs::read_dir(&path).into_iter().flatten().flatten() {
                    push_lock(out, reader.path(), resource.clone(), stale_minutes);
                }
            } else {
                collect_locks(&path, stale_minutes, out)?;
            }
        } else if let Some(resource) = name.strip_suffix(LOCK_SUFFIX) {
            push_lock(out, path.clone(), dir.join(resource), stale_minutes);
        }
    }
    Ok(())
}

fn push_lock(out: &mut Vec<LockInfo>, path: PathBuf, resource: PathBuf, stale_minutes: u32) {
    // Skip markers whose metadata cannot be read (mid-creation or foreign).
    let Ok(metadata) = LockMetadata::from_file(&path) else {
        return;
    };
    out.push(LockInfo {
        is_stale: metadata.is_stale(stale_minutes),
        mode: metadata.mode,
        path,
        resource,
        metadata,
    });
}

/// Forcibly clear every marker on `resource`.
///
/// The caller is responsible for verifying that the holders are gone.
/// Returns the markers that were removed.
pub fn clear_lock(resource: &Path, stale_minutes: u32) -> Result<Vec<LockInfo>> {
    let mut cleared = Vec::new();
    let mut found = false;

    let lock_path = lock_path_for(resource);
    if lock_path.exists() {
        found = true;
        push_lock(&mut cleared, lock_path.clone(), resource.to_path_buf(), stale_minutes);
        fs::remove_file(&lock_path).map_err(|e| {
            CrewError::Lock(format!(
                "failed to clear lock '{}': {}",
                lock_path.display(),
                e
            ))
        })?;
    }

    let readers_dir = readers_dir_for(resource);
    for reader in fs::read_dir(&readers_dir).into_iter().flatten().flatten() {
        found = true;
        push_lock(&mut cleared, reader.path(), resource.to_path_buf(), stale_minutes);
        let _ = fs::remove_file(reader.path());
    }

    if !found {
        return Err(CrewError::NotFound(format!(
            "no lock held on '{}'",
            resource.display()
        )));
    }
    Ok(cleared)
}
