//! Agent state document and lifecycle.

use crate::store::{FieldError, Validate, require_non_empty};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where an agent is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Spawning,
    Active,
    Idle,
    Inactive,
    ShuttingDown,
    Terminated,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Spawning => "spawning",
            AgentStatus::Active => "active",
            AgentStatus::Idle => "idle",
            AgentStatus::Inactive => "inactive",
            AgentStatus::ShuttingDown => "shutting_down",
            AgentStatus::Terminated => "terminated",
        }
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    ///
    /// Staying put is handled by callers as a no-op and is not listed here.
    pub fn can_transition_to(&self, next: AgentStatus) -> bool {
        use AgentStatus::*;
        matches!(
            (self, next),
            (Spawning, Active | Terminated)
                | (Active, Idle | Inactive | ShuttingDown)
                | (Idle, Active | Inactive | ShuttingDown)
                | (Inactive, Active | Idle | ShuttingDown | Terminated)
                | (ShuttingDown, Terminated)
        )
    }

    /// Whether heartbeats are expected in this status.
    pub fn is_live(&self) -> bool {
        matches!(self, AgentStatus::Active | AgentStatus::Idle)
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AgentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            AgentStatus::Spawning,
            AgentStatus::Active,
            AgentStatus::Idle,
            AgentStatus::Inactive,
            AgentStatus::ShuttingDown,
            AgentStatus::Terminated,
        ]
        .into_iter()
        .find(|status| status.as_str() == s)
        .ok_or_else(|| format!("unknown agent status '{}'", s))
    }
}

/// An agent state document (`teams/<team>/agents/<id>.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    pub id: String,

    pub role: String,

    pub status: AgentStatus,

    /// Process id reported by the orchestrator, if it launched one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,

    pub last_heartbeat: DateTime<Utc>,

    /// Heartbeat intervals missed since the last heartbeat.
    #[serde(default)]
    pub consecutive_misses: u32,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Validate for AgentState {
    fn validate(&self) -> Result<(), FieldError> {
        require_non_empty("id", &self.id)?;
        require_non_empty("role", &self.role)
    }
}
