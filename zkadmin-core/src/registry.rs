//! Alias to handle bookkeeping.

use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};
use zkadmin_client::ConnectionHandle;
use zkadmin_types::Alias;

/// Process-wide map from alias to its single live [`ConnectionHandle`].
///
/// Replacement and removal close the evicted handle while holding the write
/// lock, so a lookup sees either the old handle fully installed or the new one,
/// never one that is half closed.
#[derive(Default)]
pub struct ConnectionRegistry {
    handles: RwLock<HashMap<Alias, ConnectionHandle>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `handle` under its alias, first closing whatever it replaces.
    pub async fn put(&self, handle: ConnectionHandle) {
        let alias = handle.alias().clone();
        let mut handles = self.handles.write().await;
        if let Some(previous) = handles.get(&alias) {
            if previous.same_handle(&handle) {
                return;
            }
            debug!(alias = %alias, "closing replaced handle");
            previous.close().await;
        }
        handles.insert(alias.clone(), handle);
        info!(alias = %alias, "connection handle installed");
    }

    pub async fn get(&self, alias: &Alias) -> Option<ConnectionHandle> {
        self.handles.read().await.get(alias).cloned()
    }

    /// Closes and evicts the handle for `alias`. Returns whether one existed.
    pub async fn remove(&self, alias: &Alias) -> bool {
        let mut handles = self.handles.write().await;
        match handles.remove(alias) {
            Some(handle) => {
                handle.close().await;
                info!(alias = %alias, "connection handle removed");
                true
            }
            None => false,
        }
    }

    /// Registered aliases, sorted.
    pub async fn aliases(&self) -> Vec<Alias> {
        let mut aliases: Vec<Alias> = self.handles.read().await.keys().cloned().collect();
        aliases.sort();
        aliases
    }

    pub async fn len(&self) -> usize {
        self.handles.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.handles.read().await.is_empty()
    }

    /// Closes and evicts every handle.
    pub async fn close_all(&self) -> usize {
        let mut handles = self.handles.write().await;
        let count = handles.len();
        for (_, handle) in handles.drain() {
            handle.close().await;
        }
        if count > 0 {
            info!("closed {} connection handles", count);
        }
        count
    }
}
