//! Event records for crewfs.
//!
//! Every state-changing operation produces [`DispatchEvent`]s after it has
//! durably persisted its change. Events are notifications, not the system of
//! record: they are never written to disk by the bus.
//!
//! # Event Format
//!
//! - `id`: unique event id
//! - `type`: dotted event type (`task.completed`, `agent.spawned`, ...)
//! - `team`: the team the event is scoped to
//! - `ts`: RFC3339 timestamp
//! - `payload`: freeform object with type-specific details

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// Types of events the core produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "task.created")]
    TaskCreated,
    #[serde(rename = "task.updated")]
    TaskUpdated,
    #[serde(rename = "task.claimed")]
    TaskClaimed,
    #[serde(rename = "task.completed")]
    TaskCompleted,
    /// A pending task whose last unfinished dependency just completed.
    #[serde(rename = "task.unblocked")]
    TaskUnblocked,
    #[serde(rename = "team.created")]
    TeamCreated,
    #[serde(rename = "team.member_joined")]
    MemberJoined,
    #[serde(rename = "team.member_left")]
    MemberLeft,
    #[serde(rename = "agent.spawned")]
    AgentSpawned,
    #[serde(rename = "agent.status_changed")]
    AgentStatusChanged,
    #[serde(rename = "agent.terminated")]
    AgentTerminated,
    #[serde(rename = "message.sent")]
    MessageSent,
}

impl EventType {
    pub const ALL: [EventType; 12] = [
        EventType::TaskCreated,
        EventType::TaskUpdated,
        EventType::TaskClaimed,
        EventType::TaskCompleted,
        EventType::TaskUnblocked,
        EventType::TeamCreated,
        EventType::MemberJoined,
        EventType::MemberLeft,
        EventType::AgentSpawned,
        EventType::AgentStatusChanged,
        EventType::AgentTerminated,
        EventType::MessageSent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::TaskCreated => "task.created",
            EventType::TaskUpdated => "task.updated",
            EventType::TaskClaimed => "task.claimed",
            EventType::TaskCompleted => "task.completed",
            EventType::TaskUnblocked => "task.unblocked",
            EventType::TeamCreated => "team.created",
            EventType::MemberJoined => "team.member_joined",
            EventType::MemberLeft => "team.member_left",
            EventType::AgentSpawned => "agent.spawned",
            EventType::AgentStatusChanged => "agent.status_changed",
            EventType::AgentTerminated => "agent.terminated",
            EventType::MessageSent => "message.sent",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown event type '{}'", s))
    }
}

/// An ephemeral event delivered through the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchEvent {
    pub id: String,

    #[serde(rename = "type")]
    pub event_type: EventType,

    /// Team the event is scoped to.
    pub team: String,

    pub ts: DateTime<Utc>,

    pub payload: Value,
}

impl DispatchEvent {
    pub fn new(
        id: impl Into<String>,
        event_type: EventType,
        team: impl Into<String>,
        ts: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            event_type,
            team: team.into(),
            ts,
            payload: Value::Object(serde_json::Map::new()),
        }
    }

    /// Set the payload object for this event.
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Look up a dotted path (`task.owner`, `items.0.id`) in the payload.
    pub fn field(&self, path: &str) -> Option<&Value> {
        path.split('.').try_fold(&self.payload, |value, segment| match value {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
    }
}
