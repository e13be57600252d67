//! The dispatch loop.
//!
//! Every published event enters [`Dispatcher::handle`]. The first entry on a
//! thread opens a pass and drains a queue; events published while an action
//! runs (re-entrant `handle` calls on the same thread) are queued one level
//! deeper instead of being processed on the call stack. Events at or past
//! the depth limit are dropped.

use super::action;
use super::condition;
use super::model::{DispatchLogEntry, DispatchRule};
use super::rules;
use crate::crew::Crew;
use crate::events::DispatchEvent;
use crate::team;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::thread::{self, ThreadId};
use tracing::{debug, warn};

/// Details recorded for a rule whose condition did not hold.
pub const SKIPPED_DETAILS: &str = "condition not met, action skipped";

struct Pass {
    queue: VecDeque<(DispatchEvent, u32)>,
    /// Depth assigned to events enqueued right now.
    depth: u32,
}

/// Rule engine state shared by all threads of one process.
pub struct Dispatcher {
    max_depth: u32,
    log_capacity: usize,
    passes: Mutex<HashMap<ThreadId, Pass>>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("max_depth", &self.max_depth)
            .field("log_capacity", &self.log_capacity)
            .finish()
    }
}

/// Closes the thread's pass even if rule processing unwinds.
struct PassGuard<'a> {
    dispatcher: &'a Dispatcher,
    thread: ThreadId,
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.dispatcher.passes().remove(&self.thread);
    }
}

impl Dispatcher {
    pub fn new(max_depth: u32, log_capacity: usize) -> Self {
        Self {
            max_depth,
            log_capacity,
            passes: Mutex::new(HashMap::new()),
        }
    }

    fn passes(&self) -> MutexGuard<'_, HashMap<ThreadId, Pass>> {
        self.passes.lock().unwrap_or_else(|poison| poison.into_inner())
    }

    /// Process `event` and everything it causes on this thread.
    pub fn handle(&self, crew: &Crew, event: &DispatchEvent) {
        let thread = thread::current().id();
        {
            let mut passes = self.passes();
            if let Some(pass) = passes.get_mut(&thread) {
                pass.queue.push_back((event.clone(), pass.depth));
                return;
            }
            passes.insert(
                thread,
                Pass {
                    queue: VecDeque::from([(event.clone(), 0)]),
                    depth: 0,
                },
            );
        }
        let _guard = PassGuard {
            dispatcher: self,
            thread,
        };

        loop {
            let next = self
                .passes()
                .get_mut(&thread)
                .and_then(|pass| pass.queue.pop_front());
            let Some((event, depth)) = next else {
                break;
            };
            self.process(crew, &event, depth, thread);
        }
    }

    fn set_depth(&self, thread: ThreadId, depth: u32) {
        if let Some(pass) = self.passes().get_mut(&thread) {
            pass.depth = depth;
        }
    }

    fn process(&self, crew: &Crew, event: &DispatchEvent, depth: u32, thread: ThreadId) {
        if depth >= self.max_depth {
            warn!(
                event_type = %event.event_type,
                event_id = %event.id,
                team = %event.team,
                depth,
                "dispatch depth limit reached, dropping event"
            );
            return;
        }

        let ws = crew.workspace();
        let config = match team::get_team(ws, &event.team) {
            Ok(config) => config,
            Err(e) => {
                debug!(team = %event.team, error = %e, "no usable team config, skipping dispatch");
                return;
            }
        };

        let mut matching: Vec<&DispatchRule> = config
            .dispatch_rules
            .iter()
            .filter(|r| r.enabled && r.event_type == event.event_type)
            .collect();
        if matching.is_empty() {
            return;
        }
        matching.sort_by_key(|r| r.priority);

        let mut entries = Vec::with_capacity(matching.len());
        for rule in matching {
            let (success, details) = match condition::evaluate(ws, &config, rule.condition.as_ref(), event) {
                Ok(false) => (true, SKIPPED_DETAILS.to_string()),
                Err(e) => {
                    warn!(rule_id = %rule.id, error = %e, "dispatch condition failed");
                    (false, format!("condition could not be evaluated: {}", e))
                }
                Ok(true) => {
                    self.set_depth(thread, depth + 1);
                    let result = action::execute(crew, &config, &rule.action, event);
                    self.set_depth(thread, depth);
                    match result {
                        Ok(details) => {
                            debug!(rule_id = %rule.id, action = rule.action.name(), %details, "dispatch action ran");
                            (true, details)
                        }
                        Err(e) => {
                            warn!(rule_id = %rule.id, action = rule.action.name(), error = %e, "dispatch action failed");
                            (false, e.to_string())
                        }
                    }
                }
            };

            entries.push(DispatchLogEntry {
                id: ws.next_id("log"),
                timestamp: ws.now(),
                rule_id: rule.id.clone(),
                event_type: event.event_type,
                success,
                details,
            });
        }

        if let Err(e) = rules::append_log(ws, &event.team, entries, self.log_capacity) {
            warn!(team = %event.team, error = %e, "failed to append dispatch log");
        }
    }
}
