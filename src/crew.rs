//! The service object exposing every operation.
//!
//! A [`Crew`] owns the [`Workspace`], the event bus, the orchestrator, and
//! the dispatcher. Each operation performs its durable change, releases its
//! locks, then publishes the resulting events; the dispatcher is subscribed
//! to every event type, so rules run synchronously before the call returns.
//!
//! Permission checks happen here, before the operation runs, for operations
//! that take an acting agent.

use crate::agent::{self, AgentState, AgentStatus, Orchestrator};
use crate::bus::{EventBus, Subscription};
use crate::dispatch::{self, DispatchLogEntry, DispatchRule, Dispatcher, RuleInput};
use crate::error::Result;
use crate::events::{DispatchEvent, EventType};
use crate::inbox::{self, Message, MessageBody, PollResult};
use crate::task::{self, Task, TaskFilter, TaskInput, TaskPatch};
use crate::team::{self, NewTeam, Permission, TeamConfig};
use crate::workspace::Workspace;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::debug;

struct CrewInner {
    ws: Workspace,
    bus: EventBus,
    orchestrator: Box<dyn Orchestrator>,
    dispatcher: Dispatcher,
}

/// Cloneable handle; clones share the bus and dispatcher.
#[derive(Clone)]
pub struct Crew {
    inner: Arc<CrewInner>,
}

impl std::fmt::Debug for Crew {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Crew")
            .field("workspace", &self.inner.ws)
            .field("bus", &self.inner.bus)
            .finish()
    }
}

impl Crew {
    /// A crew using the orchestrator described by the workspace config.
    pub fn new(ws: Workspace) -> Self {
        let orchestrator = agent::from_config(&ws.config);
        Self::with_orchestrator(ws, orchestrator)
    }

    pub fn with_orchestrator(ws: Workspace, orchestrator: Box<dyn Orchestrator>) -> Self {
        let dispatcher = Dispatcher::new(ws.config.dispatch_max_depth, ws.config.dispatch_log_capacity);
        let inner = Arc::new(CrewInner {
            ws,
            bus: EventBus::new(),
            orchestrator,
            dispatcher,
        });

        for event_type in EventType::ALL {
            let weak: Weak<CrewInner> = Arc::downgrade(&inner);
            inner.bus.subscribe(event_type, move |event| {
                if let Some(inner) = weak.upgrade() {
                    let crew = Crew { inner };
                    crew.inner.dispatcher.handle(&crew, event);
                }
                Ok(())
            });
        }

        Self { inner }
    }

    /// Open the storage root named by the environment.
    pub fn open() -> Result<Self> {
        Ok(Self::new(Workspace::open()?))
    }

    pub fn workspace(&self) -> &Workspace {
        &self.inner.ws
    }

    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    /// Observe events of one type alongside the dispatcher.
    pub fn subscribe<F>(&self, event_type: EventType, handler: F) -> Subscription
    where
        F: Fn(&DispatchEvent) -> Result<()> + Send + Sync + 'static,
    {
        self.inner.bus.subscribe(event_type, handler)
    }

    fn publish<T>(&self, (value, events): (T, Vec<DispatchEvent>)) -> T {
        debug!(count = events.len(), "publishing events");
        self.inner.bus.publish_all(&events);
        value
    }

    fn require(&self, team: &str, actor: &str, permission: Permission) -> Result<()> {
        let config = team::get_team(&self.inner.ws, team)?;
        team::check_permission(&config, actor, permission)
    }

    // =========================================================================
    // Teams
    // =========================================================================

    pub fn create_team(&self, new: NewTeam) -> Result<TeamConfig> {
        Ok(self.publish(team::create_team(&self.inner.ws, new)?))
    }

    pub fn get_team(&self, team: &str) -> Result<TeamConfig> {
        team::get_team(&self.inner.ws, team)
    }

    pub fn list_teams(&self) -> Result<Vec<TeamConfig>> {
        team::list_teams(&self.inner.ws)
    }

    pub fn join_team(&self, team: &str, agent: &str, role: &str) -> Result<TeamConfig> {
        Ok(self.publish(team::join_team(&self.inner.ws, team, agent, role)?))
    }

    pub fn leave_team(&self, team: &str, agent: &str) -> Result<TeamConfig> {
        Ok(self.publish(team::leave_team(&self.inner.ws, team, agent)?))
    }

    /// Requires `delete_team`.
    pub fn delete_team(&self, team: &str, actor: &str) -> Result<()> {
        self.require(team, actor, Permission::DeleteTeam)?;
        team::delete_team(&self.inner.ws, team)
    }

    pub fn check_permission(&self, team: &str, agent: &str, permission: Permission) -> Result<()> {
        self.require(team, agent, permission)
    }

    // =========================================================================
    // Tasks
    // =========================================================================

    pub fn create_task(&self, team: &str, input: TaskInput) -> Result<Task> {
        Ok(self.publish(task::create(&self.inner.ws, team, input)?))
    }

    pub fn get_task(&self, team: &str, id: &str) -> Result<Task> {
        task::get(&self.inner.ws, team, id)
    }

    pub fn list_tasks(&self, team: &str, filter: &TaskFilter) -> Result<Vec<Task>> {
        task::list(&self.inner.ws, team, filter)
    }

    pub fn update_task(&self, team: &str, id: &str, patch: TaskPatch) -> Result<Task> {
        Ok(self.publish(task::update(&self.inner.ws, team, id, patch)?))
    }

    pub fn claim_task(&self, team: &str, id: &str, agent: &str, allow_soft_block: bool) -> Result<Task> {
        Ok(self.publish(task::claim(&self.inner.ws, team, id, agent, allow_soft_block)?))
    }

    pub fn unblocked_tasks(&self, team: &str) -> Result<Vec<Task>> {
        task::unblocked_pending(&self.inner.ws, team)
    }

    // =========================================================================
    // Agents
    // =========================================================================

    /// Requires `manage_agents`.
    pub fn spawn_agent(&self, team: &str, actor: &str, agent: &str, role: &str) -> Result<AgentState> {
        self.require(team, actor, Permission::ManageAgents)?;
        let spawned = agent::spawn(&self.inner.ws, self.inner.orchestrator.as_ref(), team, agent, role)?;
        Ok(self.publish(spawned))
    }

    /// Requires `manage_agents`.
    pub fn terminate_agent(&self, team: &str, actor: &str, agent: &str) -> Result<AgentState> {
        self.require(team, actor, Permission::ManageAgents)?;
        let terminated = agent::terminate(&self.inner.ws, self.inner.orchestrator.as_ref(), team, agent)?;
        Ok(self.publish(terminated))
    }

    pub fn set_agent_status(&self, team: &str, agent: &str, status: AgentStatus) -> Result<AgentState> {
        Ok(self.publish(agent::set_status(&self.inner.ws, team, agent, status)?))
    }

    pub fn heartbeat(&self, team: &str, agent: &str) -> Result<AgentState> {
        Ok(self.publish(agent::heartbeat(&self.inner.ws, team, agent)?))
    }

    pub fn sweep_heartbeats(&self, team: &str) -> Result<Vec<AgentState>> {
        Ok(self.publish(agent::sweep_heartbeats(&self.inner.ws, team)?))
    }

    pub fn get_agent(&self, team: &str, agent: &str) -> Result<AgentState> {
        agent::get(&self.inner.ws, team, agent)
    }

    pub fn list_agents(&self, team: &str) -> Result<Vec<AgentState>> {
        agent::list(&self.inner.ws, team)
    }

    // =========================================================================
    // Inbox
    // =========================================================================

    pub fn send_message(&self, team: &str, from: &str, to: &str, body: MessageBody) -> Result<Message> {
        Ok(self.publish(inbox::send(&self.inner.ws, team, from, to, body)?))
    }

    pub fn broadcast(&self, team: &str, from: &str, body: MessageBody) -> Result<Vec<Message>> {
        Ok(self.publish(inbox::broadcast(&self.inner.ws, team, from, body)?))
    }

    /// Poll with `timeout`, or the configured default when `None`.
    pub fn poll_inbox(&self, team: &str, agent: &str, timeout: Option<Duration>) -> Result<PollResult> {
        let timeout = timeout.unwrap_or_else(|| self.inner.ws.config.inbox_poll_timeout());
        inbox::poll(&self.inner.ws, team, agent, timeout)
    }

    pub fn inbox_messages(&self, team: &str, agent: &str) -> Result<Vec<Message>> {
        inbox::messages(&self.inner.ws, team, agent)
    }

    // =========================================================================
    // Dispatch rules
    // =========================================================================

    /// Requires `manage_rules`.
    pub fn add_rule(&self, team: &str, actor: &str, input: RuleInput) -> Result<DispatchRule> {
        self.require(team, actor, Permission::ManageRules)?;
        dispatch::add_rule(&self.inner.ws, team, input)
    }

    /// Requires `manage_rules`.
    pub fn remove_rule(&self, team: &str, actor: &str, rule_id: &str) -> Result<DispatchRule> {
        self.require(team, actor, Permission::ManageRules)?;
        dispatch::remove_rule(&self.inner.ws, team, rule_id)
    }

    /// Requires `manage_rules`.
    pub fn set_rule_enabled(&self, team: &str, actor: &str, rule_id: &str, enabled: bool) -> Result<DispatchRule> {
        self.require(team, actor, Permission::ManageRules)?;
        dispatch::set_rule_enabled(&self.inner.ws, team, rule_id, enabled)
    }

    pub fn list_rules(&self, team: &str) -> Result<Vec<DispatchRule>> {
        dispatch::list_rules(&self.inner.ws, team)
    }

    pub fn dispatch_log(&self, team: &str, limit: Option<usize>) -> Result<Vec<DispatchLogEntry>> {
        dispatch::dispatch_log(&self.inner.ws, team, limit)
    }
}
