//! Explicit dependencies shared by every operation.
//!
//! A [`Workspace`] bundles the storage layout, configuration, document store,
//! clock, and id source. It is built once per process and passed by
//! reference, so tests can substitute a fixed clock and predictable ids.

use crate::config::Config;
use crate::context::CrewContext;
use crate::error::{CrewError, Result};
use crate::events::{DispatchEvent, EventType};
use crate::locks::{LockManager, LockMode};
use crate::store::DocumentStore;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|p| p.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Generator for task, rule, message, and event ids.
pub trait IdSource: Send + Sync {
    fn next_id(&self, prefix: &str) -> String;
}

/// Random ids: `{prefix}-{12 hex chars}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIds;

impl IdSource for RandomIds {
    fn next_id(&self, prefix: &str) -> String {
        let id = uuid::Uuid::new_v4().simple().to_string();
        format!("{}-{}", prefix, &id[..12])
    }
}

/// Predictable ids: `{prefix}-1`, `{prefix}-2`, ... (one shared counter).
#[derive(Debug, Default)]
pub struct SequentialIds {
    counter: AtomicU64,
}

impl IdSource for SequentialIds {
    fn next_id(&self, prefix: &str) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{}-{}", prefix, n)
    }
}

/// Storage root, configuration, and injected services.
#[derive(Clone)]
pub struct Workspace {
    pub ctx: CrewContext,
    pub config: Config,
    pub store: DocumentStore,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdSource>,
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("root", &self.ctx.root)
            .field("config", &self.config)
            .finish()
    }
}

impl Workspace {
    /// Workspace with the system clock and random ids.
    pub fn new(ctx: CrewContext, config: Config) -> Self {
        Self::with_services(ctx, config, Arc::new(SystemClock), Arc::new(RandomIds))
    }

    pub fn with_services(
        ctx: CrewContext,
        config: Config,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdSource>,
    ) -> Self {
        let store = DocumentStore::new(LockManager::new(config.lock_options()));
        Self {
            ctx,
            config,
            store,
            clock,
            ids,
        }
    }

    /// Resolve the storage root from the environment and load its config.
    pub fn open() -> Result<Self> {
        let ctx = CrewContext::resolve()?;
        let config = Config::load_or_default(ctx.config_path())?;
        Ok(Self::new(ctx, config))
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn next_id(&self, prefix: &str) -> String {
        self.ids.next_id(prefix)
    }

    /// Build an event stamped with this workspace's clock and ids.
    pub fn event(&self, event_type: EventType, team: &str, payload: Value) -> DispatchEvent {
        DispatchEvent::new(self.next_id("evt"), event_type, team, self.now()).with_payload(payload)
    }

    /// Run `f` while holding the shared team-scope lock.
    ///
    /// Every team-scoped mutation goes through here, so team deletion (which
    /// takes the scope exclusively) can never interleave with one. Fails with
    /// `NotFound` if the team does not exist once the lock is held.
    pub fn team_scope<R>(&self, team: &str, action: &str, f: impl FnOnce() -> Result<R>) -> Result<R> {
        self.store
            .with_lock(&self.ctx.team_dir(team), LockMode::Shared, action, || {
                if !self.ctx.team_exists(team) {
                    return Err(CrewError::NotFound(format!("team '{}'", team)));
                }
                f()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_ids_share_one_counter() {
        let ids = SequentialIds::default();
        assert_eq!(ids.next_id("task"), "task-1");
        assert_eq!(ids.next_id("rule"), "rule-2");
    }

    #[test]
    fn test_random_ids_are_prefixed_and_unique() {
        let a = RandomIds.next_id("task");
        let b = RandomIds.next_id("task");
        assert!(a.starts_with("task-"));
        assert_eq!(a.len(), "task-".len() + 12);
        assert_ne!(a, b);
    }

    #[test]
    fn test_manual_clock_advances() {
        let start = Utc::now();
        let clock = ManualClock::new(start);
        clock.advance(Duration::seconds(90));
        assert_eq!(clock.now() - start, Duration::seconds(90));
    }

    #[test]
    fn test_team_scope_requires_team() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let ws = Workspace::new(CrewContext::new(temp_dir.path()), Config::default());

        let err = ws.team_scope("ghost", "test", || Ok(())).unwrap_err();
        assert!(matches!(err, CrewError::NotFound(_)));
    }
}
