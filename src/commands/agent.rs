//! `crewfs agent` subcommands.

use super::{Session, print_json};
use crate::cli::AgentAction;
use crewfs::error::Result;

pub fn run(session: &Session, action: AgentAction) -> Result<()> {
    let crew = &session.crew;
    let team = session.team()?;
    match action {
        AgentAction::Spawn(args) => {
            print_json(&crew.spawn_agent(team, session.agent()?, &args.agent_id, &args.role)?)
        }
        AgentAction::Terminate(args) => {
            print_json(&crew.terminate_agent(team, session.agent()?, &args.agent_id)?)
        }
        AgentAction::Status(args) => print_json(&crew.set_agent_status(team, &args.agent_id, args.status)?),
        AgentAction::Heartbeat => print_json(&crew.heartbeat(team, session.agent()?)?),
        AgentAction::Sweep => print_json(&crew.sweep_heartbeats(team)?),
        AgentAction::Show(args) => print_json(&crew.get_agent(team, &args.agent_id)?),
        AgentAction::List => print_json(&crew.list_agents(team)?),
    }
}
