//! `crewfs msg` subcommands.

use super::{Session, print_json};
use crate::cli::MsgAction;
use crewfs::error::Result;
use crewfs::inbox::MessageBody;
use std::time::Duration;

pub fn run(session: &Session, action: MsgAction) -> Result<()> {
    let crew = &session.crew;
    let team = session.team()?;
    let agent = session.agent()?;
    match action {
        MsgAction::Send(args) => print_json(&crew.send_message(
            team,
            agent,
            &args.to,
            MessageBody::Text { text: args.text },
        )?),
        MsgAction::Broadcast(args) => {
            print_json(&crew.broadcast(team, agent, MessageBody::Text { text: args.text })?)
        }
        MsgAction::Poll(args) => {
            let timeout = args.timeout_secs.map(Duration::from_secs);
            print_json(&crew.poll_inbox(team, agent, timeout)?)
        }
        MsgAction::List => print_json(&crew.inbox_messages(team, agent)?),
    }
}
