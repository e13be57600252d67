//! Agent state for crewfs.
//!
//! Each agent has a state document under `teams/<team>/agents/` tracking its
//! lifecycle status and liveness:
//!
//! - **Lifecycle**: `spawning -> active <-> idle`, with `inactive` for agents
//!   that stopped heartbeating and `shutting_down -> terminated` at the end
//! - **Liveness**: heartbeats reset the miss counter; a sweep counts missed
//!   intervals and marks silent agents `inactive`
//! - **Processes**: starting and stopping workers goes through an
//!   [`Orchestrator`]; the state document never depends on it succeeding
//!   beyond spawn

mod model;
mod ops;
mod orchestrator;
mod template;

#[cfg(test)]
mod tests;

pub use model::{AgentState, AgentStatus};
pub use ops::{get, heartbeat, idle_agents, list, set_status, spawn, sweep_heartbeats, terminate};
pub use orchestrator::{CommandOrchestrator, NoopOrchestrator, Orchestrator, from_config};
