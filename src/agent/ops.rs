//! Agent lifecycle operations.

use super::model::{AgentState, AgentStatus};
use super::orchestrator::Orchestrator;
use crate::context::validate_id;
use crate::error::{CrewError, Result};
use crate::events::{DispatchEvent, EventType};
use crate::locks::LockMode;
use crate::team;
use crate::workspace::Workspace;
use chrono::Duration;
use serde_json::json;
use tracing::{info, warn};

fn not_found(team: &str, agent: &str) -> CrewError {
    CrewError::NotFound(format!("agent '{}' in team '{}'", agent, team))
}

fn transact<R>(
    ws: &Workspace,
    team: &str,
    agent: &str,
    action: &str,
    mutator: impl FnOnce(&mut AgentState) -> Result<R>,
) -> Result<R> {
    validate_id("agent", agent)?;
    ws.team_scope(team, action, || {
        let path = ws.ctx.agent_path(team, agent);
        if !path.exists() {
            return Err(not_found(team, agent));
        }
        ws.store.update(&path, action, || None, mutator)
    })
}

fn status_event(ws: &Workspace, team: &str, agent: &AgentState, from: AgentStatus) -> DispatchEvent {
    ws.event(
        EventType::AgentStatusChanged,
        team,
        json!({
            "agent_id": agent.id,
            "role": agent.role,
            "from": from.as_str(),
            "to": agent.status.as_str(),
        }),
    )
}

/// Move `state` to `next`, enforcing the lifecycle. Returns the previous
/// status, or `None` when `next` is the current status.
fn transition(ws: &Workspace, state: &mut AgentState, next: AgentStatus) -> Result<Option<AgentStatus>> {
    let from = state.status;
    if from == next {
        return Ok(None);
    }
    if !from.can_transition_to(next) {
        return Err(CrewError::Conflict(format!(
            "agent '{}' cannot move from {} to {}",
            state.id, from, next
        )));
    }
    state.status = next;
    state.updated_at = ws.now();
    Ok(Some(from))
}

/// Register an agent, add it to the team, and launch its worker.
///
/// The agent is recorded as `spawning` first. A successful launch moves it
/// to `active`; a failed one moves it to `terminated` and returns the
/// launch error. An existing agent can only be spawned again once it has
/// terminated.
pub fn spawn(
    ws: &Workspace,
    orchestrator: &dyn Orchestrator,
    team: &str,
    agent: &str,
    role: &str,
) -> Result<(AgentState, Vec<DispatchEvent>)> {
    validate_id("agent", agent)?;
    if role.trim().is_empty() {
        return Err(CrewError::UserError("role must not be empty".to_string()));
    }

    let spawning = ws.team_scope(team, "agent.spawn", || {
        let path = ws.ctx.agent_path(team, agent);
        ws.store.with_lock(&path, LockMode::Exclusive, "agent.spawn", || {
            if let Some(existing) = ws.store.read_optional::<AgentState>(&path)?
                && existing.status != AgentStatus::Terminated
            {
                return Err(CrewError::Conflict(format!(
                    "agent '{}' already exists in team '{}' ({})",
                    agent, team, existing.status
                )));
            }
            let now = ws.now();
            let state = AgentState {
                id: agent.to_string(),
                role: role.to_string(),
                status: AgentStatus::Spawning,
                pid: None,
                last_heartbeat: now,
                consecutive_misses: 0,
                created_at: now,
                updated_at: now,
            };
            ws.store.write(&path, &state)?;
            Ok(state)
        })
    })?;

    let (_, mut events) = match team::join_team(ws, team, agent, role) {
        Ok(joined) => joined,
        Err(e) => {
            abandon_spawn(ws, team, agent);
            return Err(e);
        }
    };

    match orchestrator.launch(ws, team, &spawning) {
        Ok(pid) => {
            let state = transact(ws, team, agent, "agent.spawn", |state| {
                transition(ws, state, AgentStatus::Active)?;
                state.pid = pid;
                state.last_heartbeat = ws.now();
                Ok(state.clone())
            })?;
            info!(team, agent, role, pid = ?pid, "agent spawned");
            events.push(ws.event(
                EventType::AgentSpawned,
                team,
                json!({"agent_id": agent, "role": role, "pid": pid}),
            ));
            Ok((state, events))
        }
        Err(e) => {
            warn!(team, agent, error = %e, "agent launch failed");
            abandon_spawn(ws, team, agent);
            Err(e)
        }
    }
}

/// Mark a half-spawned agent terminated so it can be spawned again.
fn abandon_spawn(ws: &Workspace, team: &str, agent: &str) {
    let result = transact(ws, team, agent, "agent.spawn", |state| {
        transition(ws, state, AgentStatus::Terminated)?;
        Ok(())
    });
    if let Err(e) = result {
        warn!(team, agent, error = %e, "failed to mark agent terminated");
    }
}

/// Read one agent.
pub fn get(ws: &Workspace, team: &str, agent: &str) -> Result<AgentState> {
    validate_id("agent", agent)?;
    ws.store
        .read_optional(&ws.ctx.agent_path(team, agent))?
        .ok_or_else(|| not_found(team, agent))
}

/// Every agent in the team, ordered by id.
pub fn list(ws: &Workspace, team: &str) -> Result<Vec<AgentState>> {
    if !ws.ctx.team_exists(team) {
        return Err(CrewError::NotFound(format!("team '{}'", team)));
    }
    ws.store.list(&ws.ctx.agents_dir(team))
}

/// Idle agents, optionally limited to one role, ordered by id.
pub fn idle_agents(ws: &Workspace, team: &str, role: Option<&str>) -> Result<Vec<AgentState>> {
    Ok(list(ws, team)?
        .into_iter()
        .filter(|a| a.status == AgentStatus::Idle)
        .filter(|a| role.is_none_or(|r| a.role == r))
        .collect())
}

/// Move an agent to `status`. Emits `agent.status_changed` unless the agent
/// was already there.
pub fn set_status(
    ws: &Workspace,
    team: &str,
    agent: &str,
    status: AgentStatus,
) -> Result<(AgentState, Vec<DispatchEvent>)> {
    let (state, from) = transact(ws, team, agent, "agent.status", |state| {
        let from = transition(ws, state, status)?;
        Ok((state.clone(), from))
    })?;

    let events = match from {
        Some(from) => {
            info!(team, agent, from = %from, to = %status, "agent status changed");
            vec![status_event(ws, team, &state, from)]
        }
        None => Vec::new(),
    };
    Ok((state, events))
}

/// Record a heartbeat: stamps the time, clears missed beats, and brings an
/// inactive agent back to `active`.
pub fn heartbeat(ws: &Workspace, team: &str, agent: &str) -> Result<(AgentState, Vec<DispatchEvent>)> {
    let (state, from) = transact(ws, team, agent, "agent.heartbeat", |state| {
        if matches!(state.status, AgentStatus::ShuttingDown | AgentStatus::Terminated) {
            return Err(CrewError::Conflict(format!(
                "agent '{}' is {} and no longer accepts heartbeats",
                state.id, state.status
            )));
        }
        let from = if state.status == AgentStatus::Inactive {
            transition(ws, state, AgentStatus::Active)?
        } else {
            None
        };
        state.last_heartbeat = ws.now();
        state.consecutive_misses = 0;
        state.updated_at = state.last_heartbeat;
        Ok((state.clone(), from))
    })?;

    let events = from
        .map(|from| vec![status_event(ws, team, &state, from)])
        .unwrap_or_default();
    Ok((state, events))
}

/// Count missed heartbeats for every live agent and mark those at the miss
/// limit `inactive`. Returns the agents whose status changed.
pub fn sweep_heartbeats(ws: &Workspace, team: &str) -> Result<(Vec<AgentState>, Vec<DispatchEvent>)> {
    let interval = Duration::seconds(ws.config.heartbeat_interval_secs as i64);
    let limit = ws.config.heartbeat_miss_limit;

    let mut changed = Vec::new();
    let mut events = Vec::new();
    for candidate in list(ws, team)?.into_iter().filter(|a| a.status.is_live()) {
        let result = transact(ws, team, &candidate.id, "agent.sweep", |state| {
            if !state.status.is_live() {
                return Ok(None);
            }
            let elapsed = ws.now() - state.last_heartbeat;
            let missed = (elapsed.num_seconds() / interval.num_seconds()).max(0) as u32;
            state.consecutive_misses = missed;
            if missed >= limit {
                let from = transition(ws, state, AgentStatus::Inactive)?;
                return Ok(from.map(|from| (state.clone(), from)));
            }
            Ok(None)
        });

        match result {
            Ok(Some((state, from))) => {
                warn!(team, agent = %state.id, missed = state.consecutive_misses, "agent missed heartbeats, marked inactive");
                events.push(status_event(ws, team, &state, from));
                changed.push(state);
            }
            Ok(None) => {}
            // Removed since listing.
            Err(CrewError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
    }
    Ok((changed, events))
}

/// Shut an agent down: `shutting_down`, stop its worker, `terminated`.
///
/// A failing stop hook is logged and the agent is still terminated.
pub fn terminate(
    ws: &Workspace,
    orchestrator: &dyn Orchestrator,
    team: &str,
    agent: &str,
) -> Result<(AgentState, Vec<DispatchEvent>)> {
    let (state, from) = transact(ws, team, agent, "agent.terminate", |state| {
        let from = transition(ws, state, AgentStatus::ShuttingDown)?;
        Ok((state.clone(), from))
    })?;

    let mut events = Vec::new();
    if let Some(from) = from {
        events.push(status_event(ws, team, &state, from));
    }

    if let Err(e) = orchestrator.stop(ws, team, &state) {
        warn!(team, agent, error = %e, "stop hook failed");
    }

    let state = transact(ws, team, agent, "agent.terminate", |state| {
        transition(ws, state, AgentStatus::Terminated)?;
        Ok(state.clone())
    })?;

    info!(team, agent, "agent terminated");
    events.push(ws.event(
        EventType::AgentTerminated,
        team,
        json!({"agent_id": state.id, "role": state.role}),
    ));
    Ok((state, events))
}
