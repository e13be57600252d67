//! Storage layout and ambient context resolution for crewfs.
//!
//! [`CrewContext`] maps teams, tasks, agents, and inboxes onto paths below a
//! single storage root. Every module locates documents through it, so the
//! on-disk layout is defined in exactly one place:
//!
//! ```text
//! <root>/config.yaml
//! <root>/teams/<team>/team.json
//! <root>/teams/<team>/tasks/<task-id>.json
//! <root>/teams/<team>/agents/<agent-id>.json
//! <root>/teams/<team>/inboxes/<agent-id>.json
//! ```
//!
//! [`AmbientContext`] carries the active team and agent identity supplied by
//! the calling environment.

use crate::error::{CrewError, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Environment variable naming the storage root.
pub const ROOT_ENV: &str = "CREWFS_ROOT";

/// Environment variable naming the active team.
pub const TEAM_ENV: &str = "CREWFS_TEAM";

/// Environment variable naming the acting agent.
pub const AGENT_ENV: &str = "CREWFS_AGENT";

/// Default storage root relative to the working directory.
pub const DEFAULT_ROOT_DIR: &str = ".crewfs";

/// Resolved paths for a crewfs storage root. All paths are absolute when the
/// root is.
#[derive(Debug, Clone)]
pub struct CrewContext {
    pub root: PathBuf,

    /// Directory containing one subdirectory per team.
    pub teams_dir: PathBuf,
}

impl CrewContext {
    /// Use `root` as the storage root.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref().to_path_buf();
        let teams_dir = root.join("teams");
        Self { root, teams_dir }
    }

    /// Resolve the storage root from `CREWFS_ROOT`, falling back to
    /// `./.crewfs` under the current working directory.
    pub fn resolve() -> Result<Self> {
        if let Ok(root) = env::var(ROOT_ENV)
            && !root.trim().is_empty()
        {
            return Ok(Self::new(root));
        }

        let cwd = env::current_dir().map_err(|e| {
            CrewError::UserError(format!("failed to get current working directory: {}", e))
        })?;
        Ok(Self::new(cwd.join(DEFAULT_ROOT_DIR)))
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.yaml")
    }

    /// The team directory. Also the resource guarded by the team-scope lock.
    pub fn team_dir(&self, team: &str) -> PathBuf {
        self.teams_dir.join(team)
    }

    pub fn team_config_path(&self, team: &str) -> PathBuf {
        self.team_dir(team).join("team.json")
    }

    pub fn tasks_dir(&self, team: &str) -> PathBuf {
        self.team_dir(team).join("tasks")
    }

    pub fn task_path(&self, team: &str, task_id: &str) -> PathBuf {
        self.tasks_dir(team).join(format!("{}.json", task_id))
    }

    pub fn agents_dir(&self, team: &str) -> PathBuf {
        self.team_dir(team).join("agents")
    }

    pub fn agent_path(&self, team: &str, agent_id: &str) -> PathBuf {
        self.agents_dir(team).join(format!("{}.json", agent_id))
    }

    pub fn inboxes_dir(&self, team: &str) -> PathBuf {
        self.team_dir(team).join("inboxes")
    }

    pub fn inbox_path(&self, team: &str, agent_id: &str) -> PathBuf {
        self.inboxes_dir(team).join(format!("{}.json", agent_id))
    }

    /// Whether a team config document exists.
    pub fn team_exists(&self, team: &str) -> bool {
        self.team_config_path(team).exists()
    }
}

/// Active team and agent identity supplied by the calling environment.
///
/// The core trusts this context; it is resolved once per call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AmbientContext {
    pub team: Option<String>,
    pub agent: Option<String>,
}

impl AmbientContext {
    /// Read `CREWFS_TEAM` and `CREWFS_AGENT`. Empty values count as unset.
    pub fn from_env() -> Self {
        let read = |key: &str| env::var(key).ok().filter(|v| !v.trim().is_empty());
        Self {
            team: read(TEAM_ENV),
            agent: read(AGENT_ENV),
        }
    }

    /// Explicit values take precedence over the environment.
    pub fn with_overrides(mut self, team: Option<String>, agent: Option<String>) -> Self {
        if team.is_some() {
            self.team = team;
        }
        if agent.is_some() {
            self.agent = agent;
        }
        self
    }

    pub fn require_team(&self) -> Result<&str> {
        self.team.as_deref().ok_or_else(|| {
            CrewError::UserError(format!(
                "no active team.\n\nPass --team or set {} to select one.",
                TEAM_ENV
            ))
        })
    }

    pub fn require_agent(&self) -> Result<&str> {
        self.agent.as_deref().ok_or_else(|| {
            CrewError::UserError(format!(
                "no agent identity.\n\nPass --agent or set {} to identify the caller.",
                AGENT_ENV
            ))
        })
    }
}

/// Validate a team, task, agent, or rule identifier used as a path segment.
///
/// Identifiers must be non-empty and consist of ASCII letters, digits, `-`,
/// `_`, or `.`, and must not start with `.`. A `.lock` component is reserved
/// for lock markers, so `foo.lock` and `foo.lock.readers` are rejected.
pub fn validate_id(kind: &str, id: &str) -> Result<()> {
    let valid = !id.is_empty()
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !valid {
        return Err(CrewError::UserError(format!(
            "invalid {} id '{}': use letters, digits, '-', '_' or '.'",
            kind, id
        )));
    }
    if id.split('.').skip(1).any(|part| part == "lock") {
        return Err(CrewError::UserError(format!(
            "invalid {} id '{}': '.lock' is reserved for lock markers",
            kind, id
        )));
    }
    Ok(())
}
