//! Rule-based dispatch.
//!
//! Each team stores a list of [`DispatchRule`]s in its config. When an event
//! is published, the rules registered for its type are evaluated in
//! ascending priority order; matching rules run their [`Action`], and every
//! evaluated rule leaves one entry in the team's bounded dispatch log.
//!
//! Actions change state, state changes publish events, and those events are
//! dispatched again. The loop is bounded by a depth limit: an event produced
//! while handling a depth-`n` event has depth `n + 1`, and events at the
//! limit are dropped.

mod action;
mod condition;
mod engine;
mod model;
mod rules;


pub use action::DISPATCH_SENDER;
pub use engine::{Dispatcher, SKIPPED_DETAILS};
pub use model::{
    Action, CompareOp, Condition, CountedResource, DispatchLogEntry, DispatchRule, RuleInput,
};
pub use rules::{add_rule, dispatch_log, list_rules, remove_rule, set_rule_enabled};
