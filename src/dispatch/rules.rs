//! Rule storage and the bounded dispatch log, both kept in the team config.

use super::model::{DispatchLogEntry, DispatchRule, RuleInput};
use crate::context::validate_id;
use crate::error::{CrewError, Result};
use crate::team;
use crate::workspace::Workspace;
use tracing::info;

fn rule_not_found(team: &str, rule_id: &str) -> CrewError {
    CrewError::NotFound(format!("rule '{}' in team '{}'", rule_id, team))
}

/// Add a rule with a fresh id.
pub fn add_rule(ws: &Workspace, team: &str, input: RuleInput) -> Result<DispatchRule> {
    let rule = DispatchRule {
        id: ws.next_id("rule"),
        event_type: input.event_type,
        condition: input.condition,
        action: input.action,
        priority: input.priority,
        enabled: input.enabled,
    };

    let added = rule.clone();
    team::transact(ws, team, "rule.add", move |config| {
        config.dispatch_rules.push(added);
        Ok(())
    })?;

    info!(team, rule_id = %rule.id, event_type = %rule.event_type, action = rule.action.name(), "dispatch rule added");
    Ok(rule)
}

/// Remove a rule, returning it.
pub fn remove_rule(ws: &Workspace, team: &str, rule_id: &str) -> Result<DispatchRule> {
    validate_id("rule", rule_id)?;
    let removed = team::transact(ws, team, "rule.remove", |config| {
        let index = config
            .dispatch_rules
            .iter()
            .position(|r| r.id == rule_id)
            .ok_or_else(|| rule_not_found(team, rule_id))?;
        Ok(config.dispatch_rules.remove(index))
    })?;
    info!(team, rule_id, "dispatch rule removed");
    Ok(removed)
}

/// Enable or disable a rule.
pub fn set_rule_enabled(ws: &Workspace, team: &str, rule_id: &str, enabled: bool) -> Result<DispatchRule> {
    validate_id("rule", rule_id)?;
    team::transact(ws, team, "rule.toggle", |config| {
        let rule = config
            .dispatch_rules
            .iter_mut()
            .find(|r| r.id == rule_id)
            .ok_or_else(|| rule_not_found(team, rule_id))?;
        rule.enabled = enabled;
        Ok(rule.clone())
    })
}

/// Rules in stored order.
pub fn list_rules(ws: &Workspace, team: &str) -> Result<Vec<DispatchRule>> {
    Ok(team::get_team(ws, team)?.dispatch_rules)
}

/// Append `entries`, evicting the oldest beyond `capacity`.
pub fn append_log(ws: &Workspace, team: &str, entries: Vec<DispatchLogEntry>, capacity: usize) -> Result<()> {
    if entries.is_empty() {
        return Ok(());
    }
    team::transact(ws, team, "dispatch.log", move |config| {
        config.dispatch_log.extend(entries);
        let excess = config.dispatch_log.len().saturating_sub(capacity);
        config.dispatch_log.drain(..excess);
        Ok(())
    })
}

/// The most recent `limit` log entries, oldest first. `None` returns all.
pub fn dispatch_log(ws: &Workspace, team: &str, limit: Option<usize>) -> Result<Vec<DispatchLogEntry>> {
    let mut log = team::get_team(ws, team)?.dispatch_log;
    if let Some(limit) = limit {
        let skip = log.len().saturating_sub(limit);
        log.drain(..skip);
    }
    Ok(log)
}
