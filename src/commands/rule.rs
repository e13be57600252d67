//! `crewfs rule` subcommands.

use super::{Session, print_json};
use crate::cli::RuleAction;
use crewfs::dispatch::RuleInput;
use crewfs::error::{CrewError, Result};

pub fn run(session: &Session, action: RuleAction) -> Result<()> {
    let crew = &session.crew;
    let team = session.team()?;
    match action {
        RuleAction::Add(args) => {
            let input: RuleInput = serde_json::from_str(&args.json)
                .map_err(|e| CrewError::UserError(format!("invalid rule JSON: {}", e)))?;
            print_json(&crew.add_rule(team, session.agent()?, input)?)
        }
        RuleAction::Remove(args) => print_json(&crew.remove_rule(team, session.agent()?, &args.rule_id)?),
        RuleAction::Enable(args) => {
            print_json(&crew.set_rule_enabled(team, session.agent()?, &args.rule_id, true)?)
        }
        RuleAction::Disable(args) => {
            print_json(&crew.set_rule_enabled(team, session.agent()?, &args.rule_id, false)?)
        }
        RuleAction::List => print_json(&crew.list_rules(team)?),
    }
}
