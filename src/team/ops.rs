//! Team lifecycle, membership, and permission checks.

use super::model::{LEADER_ROLE, Member, Permission, RoleDef, TeamConfig, Topology};
use crate::context::validate_id;
use crate::error::{CrewError, Result};
use crate::events::{DispatchEvent, EventType};
use crate::locks::LockMode;
use crate::workspace::Workspace;
use serde_json::json;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use tracing::{debug, info};

/// Parameters for [`create_team`].
#[derive(Debug, Clone, Default)]
pub struct NewTeam {
    pub name: String,
    pub leader: String,
    pub topology: Option<Topology>,
    pub roles: Option<BTreeMap<String, RoleDef>>,
}

fn team_not_found(team: &str) -> CrewError {
    CrewError::NotFound(format!("team '{}'", team))
}

/// Create a team with `leader` as its first member. Emits `team.created`.
pub fn create_team(ws: &Workspace, new: NewTeam) -> Result<(TeamConfig, Vec<DispatchEvent>)> {
    validate_id("team", &new.name)?;
    validate_id("agent", &new.leader)?;

    let name = new.name.clone();
    let path = ws.ctx.team_config_path(&name);
    let team = ws.store.with_lock(&ws.ctx.team_dir(&name), LockMode::Shared, "team.create", || {
        ws.store.with_lock(&path, LockMode::Exclusive, "team.create", || {
            if path.exists() {
                return Err(CrewError::Conflict(format!("team '{}' already exists", name)));
            }
            let now = ws.now();
            let team = TeamConfig {
                name: new.name,
                leader: new.leader.clone(),
                members: vec![Member {
                    id: new.leader,
                    role: LEADER_ROLE.to_string(),
                    joined_at: now,
                }],
                topology: new.topology,
                roles: new.roles,
                dispatch_rules: Vec::new(),
                dispatch_log: Vec::new(),
                created_at: now,
            };
            ws.store.write(&path, &team)?;
            Ok(team)
        })
    })?;

    info!(team = %team.name, leader = %team.leader, "team created");
    let event = ws.event(
        EventType::TeamCreated,
        &team.name,
        json!({"team": team.name, "leader": team.leader}),
    );
    Ok((team, vec![event]))
}

/// Read a team config.
pub fn get_team(ws: &Workspace, team: &str) -> Result<TeamConfig> {
    validate_id("team", team)?;
    ws.store
        .read_optional(&ws.ctx.team_config_path(team))?
        .ok_or_else(|| team_not_found(team))
}

/// Every team under the storage root, ordered by name.
pub fn list_teams(ws: &Workspace) -> Result<Vec<TeamConfig>> {
    let entries = match fs::read_dir(&ws.ctx.teams_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(CrewError::Io(format!(
                "failed to read '{}': {}",
                ws.ctx.teams_dir.display(),
                e
            )));
        }
    };

    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().to_str().map(String::from))
        .filter(|name| !name.starts_with('.') && !name.ends_with(".lock.readers"))
        .collect();
    names.sort();

    let mut teams = Vec::with_capacity(names.len());
    for name in names {
        if let Some(team) = ws.store.read_optional(&ws.ctx.team_config_path(&name))? {
            teams.push(team);
        }
    }
    Ok(teams)
}

/// Read-modify-write the team config under the team-scope and config locks.
pub(crate) fn transact<R>(
    ws: &Workspace,
    team: &str,
    action: &str,
    mutator: impl FnOnce(&mut TeamConfig) -> Result<R>,
) -> Result<R> {
    validate_id("team", team)?;
    ws.team_scope(team, action, || {
        ws.store
            .update(&ws.ctx.team_config_path(team), action, || None, mutator)
    })
}

/// Add `agent` to the team with `role`.
///
/// Joining again with the same role is a no-op and emits nothing; joining
/// with a different role is a conflict. When the team defines roles, `role`
/// must be one of them.
pub fn join_team(ws: &Workspace, team: &str, agent: &str, role: &str) -> Result<(TeamConfig, Vec<DispatchEvent>)> {
    validate_id("agent", agent)?;
    if role.trim().is_empty() {
        return Err(CrewError::UserError("role must not be empty".to_string()));
    }

    let (config, joined) = transact(ws, team, "team.join", |config| {
        if let Some(existing) = config.member(agent) {
            if existing.role == role {
                return Ok((config.clone(), false));
            }
            return Err(CrewError::Conflict(format!(
                "agent '{}' is already a member of team '{}' with role '{}'",
                agent, team, existing.role
            )));
        }
        if let Some(roles) = &config.roles
            && role != LEADER_ROLE
            && !roles.contains_key(role)
        {
            return Err(CrewError::NotFound(format!(
                "role '{}' is not defined for team '{}'",
                role, team
            )));
        }

        config.members.push(Member {
            id: agent.to_string(),
            role: role.to_string(),
            joined_at: ws.now(),
        });
        Ok((config.clone(), true))
    })?;

    if !joined {
        debug!(team, agent, "agent already a member");
        return Ok((config, Vec::new()));
    }

    info!(team, agent, role, "agent joined team");
    let event = ws.event(
        EventType::MemberJoined,
        team,
        json!({"agent_id": agent, "role": role}),
    );
    Ok((config, vec![event]))
}

/// Remove `agent` from the team. The leader cannot leave.
pub fn leave_team(ws: &Workspace, team: &str, agent: &str) -> Result<(TeamConfig, Vec<DispatchEvent>)> {
    let config = transact(ws, team, "team.leave", |config| {
        if config.leader == agent {
            return Err(CrewError::Conflict(format!(
                "agent '{}' leads team '{}' and cannot leave it",
                agent, team
            )));
        }
        let before = config.members.len();
        config.members.retain(|m| m.id != agent);
        if config.members.len() == before {
            return Err(CrewError::NotFound(format!(
                "agent '{}' is not a member of team '{}'",
                agent, team
            )));
        }
        Ok(config.clone())
    })?;

    info!(team, agent, "agent left team");
    let event = ws.event(EventType::MemberLeft, team, json!({"agent_id": agent}));
    Ok((config, vec![event]))
}

/// Remove the team directory and everything in it.
///
/// Takes the team scope exclusively, so it waits for in-flight team-scoped
/// transactions and blocks new ones until the directory is gone.
pub fn delete_team(ws: &Workspace, team: &str) -> Result<()> {
    validate_id("team", team)?;
    let dir = ws.ctx.team_dir(team);
    ws.store.with_lock(&dir, LockMode::Exclusive, "team.delete", || {
        if !ws.ctx.team_exists(team) {
            return Err(team_not_found(team));
        }
        fs::remove_dir_all(&dir).map_err(|e| {
            CrewError::Io(format!("failed to remove '{}': {}", dir.display(), e))
        })
    })?;
    info!(team, "team deleted");
    Ok(())
}

/// Whether `agent` may perform `permission` in `team`.
///
/// The leader may do anything. Without role definitions every member may do
/// anything. With role definitions the member's role must list the
/// permission. Non-members are always refused.
pub fn check_permission(team: &TeamConfig, agent: &str, permission: Permission) -> Result<()> {
    if team.leader == agent {
        return Ok(());
    }
    let Some(member) = team.member(agent) else {
        return Err(CrewError::PermissionDenied(format!(
            "agent '{}' is not a member of team '{}'",
            agent, team.name
        )));
    };

    let allowed = match &team.roles {
        None => true,
        Some(roles) => roles
            .get(&member.role)
            .is_some_and(|def| def.permissions.contains(&permission)),
    };

    if allowed {
        Ok(())
    } else {
        Err(CrewError::PermissionDenied(format!(
            "role '{}' of agent '{}' does not grant '{}' in team '{}'",
            member.role, agent, permission, team.name
        )))
    }
}
