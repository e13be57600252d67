//! Message and inbox document model.

use crate::events::EventType;
use crate::store::{FieldError, Validate, require_non_empty};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageBody {
    Text {
        text: String,
    },
    TaskAssigned {
        task_id: String,
        title: String,
    },
    Notification {
        summary: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_type: Option<EventType>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
    },
    ShutdownRequest {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

impl MessageBody {
    pub fn kind(&self) -> &'static str {
        match self {
            MessageBody::Text { .. } => "text",
            MessageBody::TaskAssigned { .. } => "task_assigned",
            MessageBody::Notification { .. } => "notification",
            MessageBody::ShutdownRequest { .. } => "shutdown_request",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub from: String,
    pub to: String,
    pub sent_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
    pub body: MessageBody,
}

/// One agent's inbox (`teams/<team>/inboxes/<agent>.json`), oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inbox {
    pub agent: String,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Inbox {
    pub fn new(agent: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            messages: Vec::new(),
        }
    }

    pub fn unread(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| !m.read)
    }

    /// Drop the oldest read messages beyond `keep`.
    pub fn prune_read(&mut self, keep: usize) {
        let read = self.messages.iter().filter(|m| m.read).count();
        let mut excess = read.saturating_sub(keep);
        self.messages.retain(|m| {
            if m.read && excess > 0 {
                excess -= 1;
                false
            } else {
                true
            }
        });
    }
}

impl Validate for Inbox {
    fn validate(&self) -> Result<(), FieldError> {
        require_non_empty("agent", &self.agent)?;
        for (i, message) in self.messages.iter().enumerate() {
            require_non_empty(&format!("messages[{}].id", i), &message.id)?;
            if message.to != self.agent {
                return Err(FieldError::new(
                    format!("messages[{}].to", i),
                    format!("addressed to '{}', not '{}'", message.to, self.agent),
                ));
            }
        }
        Ok(())
    }
}

/// Outcome of a poll.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollResult {
    pub messages: Vec<Message>,
    /// No message arrived before the timeout.
    pub timed_out: bool,
}
