use crate::config::Config;
use crate::context::CrewContext;
use crate::team::{self, NewTeam, TeamConfig};
use crate::workspace::{ManualClock, SequentialIds, Workspace};
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use tempfile::TempDir;

/// A workspace rooted in a temp dir with a manual clock and sequential ids.
pub(crate) struct TestWorkspace {
    pub ws: Workspace,
    pub clock: Arc<ManualClock>,
    _temp_dir: TempDir,
}

pub(crate) fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 9, 0, 0).unwrap()
}

pub(crate) fn test_config() -> Config {
    Config {
        // Fast polling keeps contention tests quick.
        lock_poll_interval_ms: 1,
        inbox_poll_interval_ms: 5,
        ..Config::default()
    }
}

pub(crate) fn test_workspace() -> TestWorkspace {
    test_workspace_with(test_config())
}

pub(crate) fn test_workspace_with(config: Config) -> TestWorkspace {
    let temp_dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::new(start_time()));
    let ws = Workspace::with_services(
        CrewContext::new(temp_dir.path().join("crew")),
        config,
        clock.clone(),
        Arc::new(SequentialIds::default()),
    );
    TestWorkspace {
        ws,
        clock,
        _temp_dir: temp_dir,
    }
}

/// Create `name` led by `leader`, plus the given `(agent, role)` members.
pub(crate) fn create_test_team(ws: &Workspace, name: &str, leader: &str, members: &[(&str, &str)]) -> TeamConfig {
    let (mut config, _) = team::create_team(
        ws,
        NewTeam {
            name: name.to_string(),
            leader: leader.to_string(),
            ..NewTeam::default()
        },
    )
    .unwrap();
    for (agent, role) in members {
        config = team::join_team(ws, name, agent, role).unwrap().0;
    }
    config
}
