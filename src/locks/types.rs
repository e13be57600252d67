//! Lock mode and information structures.

use super::metadata::LockMetadata;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How a resource is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockMode {
    /// Any number of shared holders may coexist.
    Shared,
    /// Excludes every other holder, shared or exclusive.
    Exclusive,
}

impl LockMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockMode::Shared => "shared",
            LockMode::Exclusive => "exclusive",
        }
    }
}

impl std::fmt::Display for LockMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Information about an active lock marker.
#[derive(Debug, Clone)]
pub struct LockInfo {
    /// The marker file path.
    pub path: PathBuf,

    /// The protected resource.
    pub resource: PathBuf,

    pub mode: LockMode,

    pub metadata: LockMetadata,

    /// Whether the marker is older than the stale threshold.
    pub is_stale: bool,
}

impl std::fmt::Display for LockInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] (owner: {}, age: {}, action: {}{})",
            self.resource.display(),
            self.mode,
            self.metadata.owner,
            self.metadata.age_string(),
            self.metadata.action,
            if self.is_stale { ", STALE" } else { "" }
        )
    }
}
