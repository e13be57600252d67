//! Teams: the unit that owns tasks, agents, inboxes, and dispatch rules.
//!
//! A team is a directory under `teams/` holding its config document and the
//! child collections. Creation and deletion are the only operations that
//! touch the directory itself; everything else mutates documents inside it
//! under the shared team-scope lock.

mod model;
mod ops;

#[cfg(test)]
mod tests;

pub use model::{LEADER_ROLE, Member, Permission, RoleDef, TeamConfig, Topology};
pub(crate) use ops::transact;
pub use ops::{
    NewTeam, check_permission, create_team, delete_team, get_team, join_team, leave_team,
    list_teams,
};
