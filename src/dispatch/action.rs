//! Rule actions.
//!
//! Actions go through [`Crew`] so every state change they make publishes its
//! events like any other caller's would; those events come back into the
//! dispatcher one level deeper.

use super::model::Action;
use crate::agent::{self, AgentStatus};
use crate::crew::Crew;
use crate::error::{CrewError, Result};
use crate::events::DispatchEvent;
use crate::inbox::MessageBody;
use crate::team::TeamConfig;

/// Sender id on messages produced by dispatch actions.
pub const DISPATCH_SENDER: &str = "dispatch";

/// Run `action` for `event`. Returns log details on success.
pub fn execute(crew: &Crew, team: &TeamConfig, action: &Action, event: &DispatchEvent) -> Result<String> {
    match action {
        Action::AssignTask { role } => assign_task(crew, team, role.as_deref()),
        Action::NotifyLeader { message } => notify_leader(crew, team, message.as_deref(), event),
        Action::Log { message } => Ok(message
            .clone()
            .unwrap_or_else(|| format!("{} {}", event.event_type, event.payload))),
    }
}

/// Claim the best unblocked pending task for the first idle agent.
fn assign_task(crew: &Crew, team: &TeamConfig, role: Option<&str>) -> Result<String> {
    let ws = crew.workspace();

    let Some(agent) = agent::idle_agents(ws, &team.name, role)?.into_iter().next() else {
        return Err(CrewError::ActionFailed(match role {
            Some(role) => format!("no idle agent with role '{}'", role),
            None => "no idle agent".to_string(),
        }));
    };
    let Some(task) = crew.unblocked_tasks(&team.name)?.into_iter().next() else {
        return Err(CrewError::ActionFailed("no unblocked pending task".to_string()));
    };

    crew.claim_task(&team.name, &task.id, &agent.id, false)?;
    crew.set_agent_status(&team.name, &agent.id, AgentStatus::Active)?;
    crew.send_message(
        &team.name,
        DISPATCH_SENDER,
        &agent.id,
        MessageBody::TaskAssigned {
            task_id: task.id.clone(),
            title: task.title.clone(),
        },
    )?;

    Ok(format!("assigned task '{}' to agent '{}'", task.id, agent.id))
}

fn notify_leader(crew: &Crew, team: &TeamConfig, message: Option<&str>, event: &DispatchEvent) -> Result<String> {
    let summary = match message {
        Some(message) => message.to_string(),
        None => format!("{} in team '{}': {}", event.event_type, team.name, event.payload),
    };

    crew.send_message(
        &team.name,
        DISPATCH_SENDER,
        &team.leader,
        MessageBody::Notification {
            summary,
            event_type: Some(event.event_type),
            event_id: Some(event.id.clone()),
        },
    )?;

    Ok(format!("notified leader '{}'", team.leader))
}
