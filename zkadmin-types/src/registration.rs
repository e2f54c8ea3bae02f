//! Cluster registration records.

use crate::{Alias, ConnState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A cluster registered under an alias.
///
/// Identity is the alias. `conn_state` is the last state observed by the
/// control plane and is written back on every transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRegistration {
    pub alias: Alias,
    /// Comma-separated `host:port` connection string.
    pub hosts: String,
    #[serde(default)]
    pub conn_state: ConnState,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl ClusterRegistration {
    /// Creates a fresh, not yet connected registration.
    pub fn new(alias: Alias, hosts: impl Into<String>) -> Self {
        Self {
            alias,
            hosts: hosts.into(),
            conn_state: ConnState::Disconnected,
            updated_at: Utc::now(),
        }
    }

    /// The individual `host:port` entries of the connection string.
    pub fn host_list(&self) -> impl Iterator<Item = &str> {
        self.hosts
            .split(',')
            .map(str::trim)
            .filter(|h| !h.is_empty())
    }
}
