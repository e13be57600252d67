//! Validated JSON document reads, atomic writes, and locked transactions.

use super::schema::Validate;
use crate::error::{CrewError, Result};
use crate::fs::atomic_write;
use crate::locks::{LockGuard, LockManager, LockMode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Durable store for JSON documents shared between processes.
#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    locks: LockManager,
}

impl DocumentStore {
    pub fn new(locks: LockManager) -> Self {
        Self { locks }
    }

    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    /// Read and validate a document.
    ///
    /// # Errors
    ///
    /// * `NotFound` if the file does not exist
    /// * `Parse` if the file is not valid JSON
    /// * `Validation` if the JSON does not have the shape of `T`
    pub fn read<T: DeserializeOwned + Validate>(&self, path: &Path) -> Result<T> {
        self.read_optional(path)?.ok_or_else(|| {
            CrewError::NotFound(format!("document '{}' does not exist", path.display()))
        })
    }

    /// Like [`read`](Self::read), but a missing file is `Ok(None)`.
    pub fn read_optional<T: DeserializeOwned + Validate>(&self, path: &Path) -> Result<Option<T>> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CrewError::Io(format!(
                    "failed to read '{}': {}",
                    path.display(),
                    e
                )));
            }
        };

        let raw: serde_json::Value = serde_json::from_str(&content)
            .map_err(|e| CrewError::parse(path.display(), e.to_string()))?;
        let value: T = serde_json::from_value(raw)
            .map_err(|e| CrewError::validation(path.display(), e.to_string()))?;
        value
            .validate()
            .map_err(|e| CrewError::validation(path.display(), e.to_string()))?;

        Ok(Some(value))
    }

    /// Validate, serialize, and atomically replace the document at `path`.
    pub fn write<T: Serialize + Validate>(&self, path: &Path, value: &T) -> Result<()> {
        value
            .validate()
            .map_err(|e| CrewError::validation(path.display(), e.to_string()))?;
        self.write_unchecked(path, value)
    }

    /// Serialize and atomically replace the document without validation.
    pub fn write_unchecked<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let mut json = serde_json::to_string_pretty(value).map_err(|e| {
            CrewError::Io(format!("failed to serialize '{}': {}", path.display(), e))
        })?;
        json.push('\n');
        atomic_write(path, json.as_bytes())
    }

    /// Acquire `mode` on `resource` for the duration of `f`.
    pub fn with_lock<R>(
        &self,
        resource: &Path,
        mode: LockMode,
        action: &str,
        f: impl FnOnce() -> Result<R>,
    ) -> Result<R> {
        let _guard: LockGuard = self.locks.acquire(resource, mode, action)?;
        f()
    }

    /// Read-modify-write `path` under an exclusive lock on `resource`.
    ///
    /// The current document (or `default()` if it does not exist) is handed
    /// to `mutator`. If the mutator returns an error nothing is written. The
    /// result is validated and atomically written before the lock is
    /// released. Serializable only with respect to other holders of the same
    /// resource.
    pub fn locked_transaction<T, R>(
        &self,
        resource: &Path,
        path: &Path,
        action: &str,
        default: impl FnOnce() -> Option<T>,
        mutator: impl FnOnce(&mut T) -> Result<R>,
    ) -> Result<R>
    where
        T: Serialize + DeserializeOwned + Validate,
    {
        let _guard = self.locks.acquire(resource, LockMode::Exclusive, action)?;

        let mut value = match self.read_optional::<T>(path)? {
            Some(value) => value,
            None => default().ok_or_else(|| {
                CrewError::NotFound(format!("document '{}' does not exist", path.display()))
            })?,
        };

        let output = mutator(&mut value)?;
        self.write(path, &value)?;
        debug!(path = %path.display(), action, "transaction committed");
        Ok(output)
    }

    /// Transaction where the lock resource is the document itself.
    pub fn update<T, R>(
        &self,
        path: &Path,
        action: &str,
        default: impl FnOnce() -> Option<T>,
        mutator: impl FnOnce(&mut T) -> Result<R>,
    ) -> Result<R>
    where
        T: Serialize + DeserializeOwned + Validate,
    {
        self.locked_transaction(path, path, action, default, mutator)
    }

    /// Read every `*.json` document in `dir`, sorted by file name.
    ///
    /// A missing directory yields an empty list. Temp files and lock markers
    /// are skipped.
    pub fn list<T: DeserializeOwned + Validate>(&self, dir: &Path) -> Result<Vec<T>> {
        let mut documents = Vec::new();
        for path in document_paths(dir)? {
            // Deleted between listing and reading: skip it.
            if let Some(doc) = self.read_optional(&path)? {
                documents.push(doc);
            }
        }
        Ok(documents)
    }

    /// Like [`list`](Self::list), but documents that fail to parse or
    /// validate are logged and left out.
    pub fn list_readable<T: DeserializeOwned + Validate>(&self, dir: &Path) -> Result<Vec<T>> {
        let mut documents = Vec::new();
        for path in document_paths(dir)? {
            match self.read_optional(&path) {
                Ok(Some(doc)) => documents.push(doc),
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable document"),
            }
        }
        Ok(documents)
    }
}

fn document_paths(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(CrewError::Io(format!(
                "failed to read directory '{}': {}",
                dir.display(),
                e
            )));
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            !name.starts_with('.') && name.ends_with(".json") && path.is_file()
        })
        .collect();
    paths.sort();
    Ok(paths)
}
