//! Config loading, validation, and utility operations.

use super::model::Config;
use crate::error::{CrewError, Result};
use crate::locks::LockOptions;
use std::path::Path;
use std::time::Duration;

impl Config {
    /// Load config from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            CrewError::UserError(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Load config from a YAML file, or defaults if the file does not exist.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)
            .map_err(|e| CrewError::UserError(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| {
            CrewError::UserError(format!("failed to serialize config to YAML: {}", e))
        })
    }

    /// Validate config values and return error on invalid values.
    ///
    /// Every threshold, interval, and capacity must be positive.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("lock_stale_minutes", self.lock_stale_minutes as u64),
            ("lock_poll_interval_ms", self.lock_poll_interval_ms),
            ("dispatch_max_depth", self.dispatch_max_depth as u64),
            ("dispatch_log_capacity", self.dispatch_log_capacity as u64),
            ("inbox_poll_interval_ms", self.inbox_poll_interval_ms),
            ("heartbeat_interval_secs", self.heartbeat_interval_secs),
            ("heartbeat_miss_limit", self.heartbeat_miss_limit as u64),
            ("agent_stop_timeout_secs", self.agent_stop_timeout_secs),
        ];

        for (field, value) in positive {
            if value == 0 {
                return Err(CrewError::UserError(format!(
                    "config validation failed: {} must be greater than 0",
                    field
                )));
            }
        }

        for (field, value) in [
            ("agent_launch_command", &self.agent_launch_command),
            ("agent_stop_command", &self.agent_stop_command),
        ] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                return Err(CrewError::UserError(format!(
                    "config validation failed: {} must not be empty when set",
                    field
                )));
            }
        }

        Ok(())
    }

    /// Lock tuning derived from this config.
    pub fn lock_options(&self) -> LockOptions {
        LockOptions {
            poll_interval: Duration::from_millis(self.lock_poll_interval_ms),
            stale_minutes: self.lock_stale_minutes,
        }
    }

    pub fn inbox_poll_interval(&self) -> Duration {
        Duration::from_millis(self.inbox_poll_interval_ms)
    }

    pub fn inbox_poll_timeout(&self) -> Duration {
        Duration::from_secs(self.inbox_poll_timeout_secs)
    }
}
