//! Runtime configuration.

use crate::error::{AdminError, AdminResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Tunables for sessions, copies and notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Session timeout negotiated with the cluster, in milliseconds.
    pub session_timeout_ms: u64,
    /// Time allowed to establish a session, in milliseconds.
    pub connection_timeout_ms: u64,
    /// Deepest relative level a copy will descend to.
    pub max_copy_depth: usize,
    /// Buffered events per notification subscriber.
    pub notification_capacity: usize,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            session_timeout_ms: 60_000,
            connection_timeout_ms: 15_000,
            max_copy_depth: 256,
            notification_capacity: 256,
        }
    }
}

impl AdminConfig {
    /// Parses a JSON document. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> AdminResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| AdminError::Config(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> AdminResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            AdminError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    fn validate(&self) -> AdminResult<()> {
        if self.max_copy_depth == 0 {
            return Err(AdminError::Config("max_copy_depth must be at least 1".into()));
        }
        if self.notification_capacity == 0 {
            return Err(AdminError::Config(
                "notification_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
