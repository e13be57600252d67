//! `crewfs team` subcommands.

use super::{Session, print_json};
use crate::cli::{TeamAction, TeamCreateArgs};
use crewfs::error::{CrewError, Result};
use crewfs::team::{NewTeam, RoleDef};
use serde_json::json;
use std::collections::BTreeMap;

pub fn run(session: &Session, action: TeamAction) -> Result<()> {
    let crew = &session.crew;
    match action {
        TeamAction::Create(args) => cmd_create(session, args),
        TeamAction::Show => print_json(&crew.get_team(session.team()?)?),
        TeamAction::List => print_json(&crew.list_teams()?),
        TeamAction::Join(args) => print_json(&crew.join_team(session.team()?, session.agent()?, &args.role)?),
        TeamAction::Leave => print_json(&crew.leave_team(session.team()?, session.agent()?)?),
        TeamAction::Delete => {
            let team = session.team()?;
            crew.delete_team(team, session.agent()?)?;
            print_json(&json!({"deleted": team}))
        }
    }
}

fn cmd_create(session: &Session, args: TeamCreateArgs) -> Result<()> {
    let roles = args
        .roles
        .as_deref()
        .map(|raw| {
            serde_json::from_str::<BTreeMap<String, RoleDef>>(raw)
                .map_err(|e| CrewError::UserError(format!("invalid --roles JSON: {}", e)))
        })
        .transpose()?;

    let team = session.crew.create_team(NewTeam {
        name: args.name,
        leader: session.agent()?.to_string(),
        topology: args.topology,
        roles,
    })?;
    print_json(&team)
}
