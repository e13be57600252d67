//! crewfs: file-based coordination for multi-agent teams.
//!
//! All shared state lives in JSON documents below one storage root. Writers
//! serialize through advisory lock files and replace documents atomically, so
//! any number of processes can coordinate through the same directory.
//!
//! The entry point is [`Crew`], which exposes team, task, agent, inbox, and
//! dispatch-rule operations and publishes an event for every state change.
//! Dispatch rules stored in each team's config react to those events.

pub mod agent;
pub mod bus;
pub mod config;
pub mod context;
pub mod crew;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod exit_codes;
pub mod fs;
pub mod inbox;
pub mod locks;
pub mod store;
pub mod task;
pub mod team;
pub mod workspace;

#[cfg(test)]
mod test_support;

pub use crew::Crew;
pub use error::{CrewError, Result};
pub use events::{DispatchEvent, EventType};
pub use workspace::Workspace;
