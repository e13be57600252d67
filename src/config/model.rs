//! Config struct definition and default implementation.

use serde::{Deserialize, Serialize};

/// Runtime configuration for a crewfs storage root.
///
/// This struct represents the contents of `<root>/config.yaml`. A missing
/// file means all defaults. Unknown fields in the YAML are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Lock settings
    // =========================================================================
    /// Minutes after which a lock marker is considered stale and reclaimed.
    pub lock_stale_minutes: u32,

    /// Milliseconds to sleep between lock acquisition attempts.
    pub lock_poll_interval_ms: u64,

    // =========================================================================
    // Dispatch settings
    // =========================================================================
    /// Events at or beyond this depth are dropped by the dispatch engine.
    pub dispatch_max_depth: u32,

    /// Maximum dispatch log entries retained per team.
    pub dispatch_log_capacity: usize,

    // =========================================================================
    // Inbox settings
    // =========================================================================
    /// Milliseconds between inbox checks while long-polling.
    pub inbox_poll_interval_ms: u64,

    /// Default long-poll timeout in seconds.
    pub inbox_poll_timeout_secs: u64,

    // =========================================================================
    // Agent liveness
    // =========================================================================
    /// Expected seconds between agent heartbeats.
    pub heartbeat_interval_secs: u64,

    /// Consecutive missed heartbeats before an agent becomes inactive.
    pub heartbeat_miss_limit: u32,

    // =========================================================================
    // Orchestrator
    // =========================================================================
    /// Command template run to start an agent worker. Variables: `{root}`,
    /// `{team}`, `{agent}`, `{role}`. Unset means agents are tracked but no
    /// process is started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_launch_command: Option<String>,

    /// Command template run to stop an agent worker. Also receives `{pid}`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_stop_command: Option<String>,

    /// Seconds to wait for the stop command before killing it.
    pub agent_stop_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lock_stale_minutes: 120,
            lock_poll_interval_ms: 10,
            dispatch_max_depth: 3,
            dispatch_log_capacity: 500,
            inbox_poll_interval_ms: 100,
            inbox_poll_timeout_secs: 30,
            heartbeat_interval_secs: 30,
            heartbeat_miss_limit: 3,
            agent_launch_command: None,
            agent_stop_command: None,
            agent_stop_timeout_secs: 10,
        }
    }
}
