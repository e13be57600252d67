//! Tests for agent lifecycle, heartbeats, and orchestrator hooks.

use super::*;
use crate::error::{CrewError, Result};
use crate::events::EventType;
use crate::team;
use crate::test_support::{TestWorkspace, create_test_team, test_workspace};
use crate::workspace::Workspace;
use chrono::Duration;
use std::sync::Mutex;

/// Records hook calls; optionally refuses to launch.
#[derive(Default)]
struct RecordingOrchestrator {
    fail_launch: bool,
    calls: Mutex<Vec<String>>,
}

impl Orchestrator for RecordingOrchestrator {
    fn launch(&self, _ws: &Workspace, _team: &str, agent: &AgentState) -> Result<Option<u32>> {
        self.calls.lock().unwrap().push(format!("launch {}", agent.id));
        if self.fail_launch {
            return Err(CrewError::Io("no capacity".to_string()));
        }
        Ok(Some(4242))
    }

    fn stop(&self, _ws: &Workspace, _team: &str, agent: &AgentState) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("stop {} {}", agent.id, agent.status));
        Err(CrewError::Io("already gone".to_string()))
    }
}

fn setup() -> TestWorkspace {
    let t = test_workspace();
    create_test_team(&t.ws, "alpha", "lead", &[]);
    t
}

fn spawn_worker(t: &TestWorkspace, id: &str) -> AgentState {
    spawn(&t.ws, &NoopOrchestrator, "alpha", id, "worker").unwrap().0
}

#[test]
fn test_spawn_activates_and_joins_team() {
    let t = setup();
    let orchestrator = RecordingOrchestrator::default();

    let (state, events) = spawn(&t.ws, &orchestrator, "alpha", "w1", "worker").unwrap();

    assert_eq!(state.status, AgentStatus::Active);
    assert_eq!(state.pid, Some(4242));
    assert_eq!(*orchestrator.calls.lock().unwrap(), vec!["launch w1"]);
    let types: Vec<EventType> = events.iter().map(|e| e.event_type).collect();
    assert_eq!(types, vec![EventType::MemberJoined, EventType::AgentSpawned]);

    let team = team::get_team(&t.ws, "alpha").unwrap();
    assert_eq!(team.member("w1").unwrap().role, "worker");
    assert_eq!(get(&t.ws, "alpha", "w1").unwrap(), state);
}

#[test]
fn test_failed_launch_terminates() {
    let t = setup();
    let orchestrator = RecordingOrchestrator {
        fail_launch: true,
        ..Default::default()
    };

    let err = spawn(&t.ws, &orchestrator, "alpha", "w1", "worker").unwrap_err();
    assert!(err.to_string().contains("no capacity"));
    assert_eq!(get(&t.ws, "alpha", "w1").unwrap().status, AgentStatus::Terminated);

    // A terminated agent may be spawned again.
    let (state, _) = spawn(&t.ws, &NoopOrchestrator, "alpha", "w1", "worker").unwrap();
    assert_eq!(state.status, AgentStatus::Active);
}

#[test]
fn test_spawn_existing_agent_conflicts() {
    let t = setup();
    spawn_worker(&t, "w1");

    let err = spawn(&t.ws, &NoopOrchestrator, "alpha", "w1", "worker").unwrap_err();
    assert!(matches!(err, CrewError::Conflict(_)));
}

#[test]
fn test_spawn_with_conflicting_role_is_abandoned() {
    let t = setup();
    team::join_team(&t.ws, "alpha", "w1", "reviewer").unwrap();

    let err = spawn(&t.ws, &NoopOrchestrator, "alpha", "w1", "worker").unwrap_err();
    assert!(matches!(err, CrewError::Conflict(_)));
    assert_eq!(get(&t.ws, "alpha", "w1").unwrap().status, AgentStatus::Terminated);
}

#[test]
fn test_set_status_follows_lifecycle() {
    let t = setup();
    spawn_worker(&t, "w1");

    let (state, events) = set_status(&t.ws, "alpha", "w1", AgentStatus::Idle).unwrap();
    assert_eq!(state.status, AgentStatus::Idle);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].payload["from"], "active");
    assert_eq!(events[0].payload["to"], "idle");

    let (_, events) = set_status(&t.ws, "alpha", "w1", AgentStatus::Idle).unwrap();
    assert!(events.is_empty());

    let err = set_status(&t.ws, "alpha", "w1", AgentStatus::Spawning).unwrap_err();
    assert!(matches!(err, CrewError::Conflict(_)));
    let err = set_status(&t.ws, "alpha", "w1", AgentStatus::Terminated).unwrap_err();
    assert!(matches!(err, CrewError::Conflict(_)));
}

#[test]
fn test_unknown_agent() {
    let t = setup();
    let err = set_status(&t.ws, "alpha", "ghost", AgentStatus::Idle).unwrap_err();
    assert!(matches!(err, CrewError::NotFound(_)));
    assert!(matches!(get(&t.ws, "alpha", "ghost").unwrap_err(), CrewError::NotFound(_)));
}

#[test]
fn test_idle_agents_filter_by_role() {
    let t = setup();
    spawn_worker(&t, "w1");
    spawn_worker(&t, "w2");
    spawn(&t.ws, &NoopOrchestrator, "alpha", "r1", "reviewer").unwrap();
    set_status(&t.ws, "alpha", "w2", AgentStatus::Idle).unwrap();
    set_status(&t.ws, "alpha", "r1", AgentStatus::Idle).unwrap();

    let all: Vec<String> = idle_agents(&t.ws, "alpha", None).unwrap().into_iter().map(|a| a.id).collect();
    assert_eq!(all, vec!["r1", "w2"]);

    let workers: Vec<String> = idle_agents(&t.ws, "alpha", Some("worker"))
        .unwrap()
        .into_iter()
        .map(|a| a.id)
        .collect();
    assert_eq!(workers, vec!["w2"]);
}

#[test]
fn test_sweep_marks_silent_agents_inactive() {
    let t = setup();
    spawn_worker(&t, "quiet");
    spawn_worker(&t, "chatty");
    let interval = t.ws.config.heartbeat_interval_secs as i64;

    t.clock.advance(Duration::seconds(interval * 2));
    heartbeat(&t.ws, "alpha", "chatty").unwrap();
    let (changed, events) = sweep_heartbeats(&t.ws, "alpha").unwrap();
    assert!(changed.is_empty());
    assert!(events.is_empty());
    assert_eq!(get(&t.ws, "alpha", "quiet").unwrap().consecutive_misses, 2);

    t.clock.advance(Duration::seconds(interval));
    let (changed, events) = sweep_heartbeats(&t.ws, "alpha").unwrap();
    let ids: Vec<&str> = changed.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["quiet"]);
    assert_eq!(changed[0].status, AgentStatus::Inactive);
    assert_eq!(events[0].event_type, EventType::AgentStatusChanged);
    assert_eq!(get(&t.ws, "alpha", "chatty").unwrap().status, AgentStatus::Active);
}

#[test]
fn test_heartbeat_revives_inactive_agent() {
    let t = setup();
    spawn_worker(&t, "w1");
    t.clock.advance(Duration::seconds(t.ws.config.heartbeat_interval_secs as i64 * 5));
    sweep_heartbeats(&t.ws, "alpha").unwrap();
    assert_eq!(get(&t.ws, "alpha", "w1").unwrap().status, AgentStatus::Inactive);

    let (state, events) = heartbeat(&t.ws, "alpha", "w1").unwrap();
    assert_eq!(state.status, AgentStatus::Active);
    assert_eq!(state.consecutive_misses, 0);
    assert_eq!(state.last_heartbeat, t.ws.now());
    assert_eq!(events.len(), 1);
}

#[test]
fn test_terminate_goes_through_shutting_down() {
    let t = setup();
    spawn_worker(&t, "w1");
    let orchestrator = RecordingOrchestrator::default();

    let (state, events) = terminate(&t.ws, &orchestrator, "alpha", "w1").unwrap();

    assert_eq!(state.status, AgentStatus::Terminated);
    // The stop hook saw the agent mid-shutdown; its failure did not block termination.
    assert_eq!(*orchestrator.calls.lock().unwrap(), vec!["stop w1 shutting_down"]);
    let types: Vec<EventType> = events.iter().map(|e| e.event_type).collect();
    assert_eq!(types, vec![EventType::AgentStatusChanged, EventType::AgentTerminated]);

    let err = heartbeat(&t.ws, "alpha", "w1").unwrap_err();
    assert!(matches!(err, CrewError::Conflict(_)));
    let err = terminate(&t.ws, &orchestrator, "alpha", "w1").unwrap_err();
    assert!(matches!(err, CrewError::Conflict(_)));
}
