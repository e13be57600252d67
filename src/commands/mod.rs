//! Command implementations for crewfs.
//!
//! Each subcommand opens a [`Session`] (the crew plus the resolved ambient
//! team and agent), calls one library operation, and prints the result as
//! JSON on stdout.

mod agent;
mod lock;
mod msg;
mod rule;
mod task;
mod team;

use crate::cli::{Cli, Command, LogArgs};
use crewfs::context::AmbientContext;
use crewfs::error::{CrewError, Result};
use crewfs::Crew;
use serde::Serialize;

/// An opened storage root plus the caller's identity.
pub(crate) struct Session {
    pub crew: Crew,
    pub ambient: AmbientContext,
}

impl Session {
    fn open(team: Option<String>, agent: Option<String>) -> Result<Self> {
        Ok(Self {
            crew: Crew::open()?,
            ambient: AmbientContext::from_env().with_overrides(team, agent),
        })
    }

    pub fn team(&self) -> Result<&str> {
        self.ambient.require_team()
    }

    pub fn agent(&self) -> Result<&str> {
        self.ambient.require_agent()
    }
}

/// Print `value` as pretty JSON on stdout.
pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| CrewError::Io(format!("failed to serialize output: {}", e)))?;
    println!("{}", json);
    Ok(())
}

/// Route a parsed command line to its implementation.
pub fn dispatch(cli: Cli) -> Result<()> {
    let session = Session::open(cli.team, cli.agent)?;
    match cli.command {
        Command::Team(cmd) => team::run(&session, cmd.action),
        Command::Task(cmd) => task::run(&session, cmd.action),
        Command::Agent(cmd) => agent::run(&session, cmd.action),
        Command::Msg(cmd) => msg::run(&session, cmd.action),
        Command::Rule(cmd) => rule::run(&session, cmd.action),
        Command::Log(args) => cmd_log(&session, args),
        Command::Lock(cmd) => lock::run(&session, cmd.action),
    }
}

fn cmd_log(session: &Session, args: LogArgs) -> Result<()> {
    print_json(&session.crew.dispatch_log(session.team()?, args.limit)?)
}
