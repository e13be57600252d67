//! Dispatch rules, conditions, actions, and audit log entries.

use crate::events::EventType;
use crate::store::{FieldError, Validate, require_non_empty};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Comparison operators shared by both condition kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Neq,
    Gt,
    Lt,
    Gte,
    Lte,
}

/// Live counts a `resource_count` condition can inspect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountedResource {
    /// Pending tasks whose dependencies are all completed.
    UnblockedPendingTasks,
    /// Team members other than the leader.
    NonLeaderMembers,
}

/// Optional gate evaluated before a rule's action runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    /// Compare a dotted payload path with a literal.
    FieldMatch {
        field: String,
        op: CompareOp,
        value: Value,
    },
    /// Compare a live count with a number.
    ResourceCount {
        resource: CountedResource,
        op: CompareOp,
        value: i64,
    },
}

/// What a matching rule does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Pair an idle agent with the best unblocked pending task.
    AssignTask {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        role: Option<String>,
    },
    /// Deliver a notification to the team leader's inbox.
    NotifyLeader {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// Record the event in the dispatch log and nothing else.
    Log {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::AssignTask { .. } => "assign_task",
            Action::NotifyLeader { .. } => "notify_leader",
            Action::Log { .. } => "log",
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// A persisted dispatch rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchRule {
    pub id: String,

    pub event_type: EventType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,

    pub action: Action,

    /// Lower runs first.
    #[serde(default)]
    pub priority: i32,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Validate for DispatchRule {
    fn validate(&self) -> Result<(), FieldError> {
        require_non_empty("id", &self.id)?;
        if let Some(Condition::FieldMatch { field, .. }) = &self.condition {
            require_non_empty("condition.field", field)?;
        }
        Ok(())
    }
}

/// Fields supplied when adding a rule; the id is assigned on insert.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RuleInput {
    pub event_type: EventType,
    #[serde(default)]
    pub condition: Option<Condition>,
    pub action: Action,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// One audit record per evaluated rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchLogEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub rule_id: String,
    pub event_type: EventType,
    pub success: bool,
    pub details: String,
}

impl Validate for DispatchLogEntry {
    fn validate(&self) -> Result<(), FieldError> {
        require_non_empty("id", &self.id)?;
        require_non_empty("rule_id", &self.rule_id)
    }
}
