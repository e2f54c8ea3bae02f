//! Registration persistence.
//!
//! The control plane reads `{alias, hosts}` from the store to build handles
//! and writes the last observed connection state back. Implementations must be
//! cheap enough to call from a state observer.

use crate::error::AdminResult;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Mutex;
use zkadmin_types::{Alias, ClusterRegistration, ConnState};

/// Storage for cluster registrations, keyed by alias.
pub trait RegistrationStore: Send + Sync {
    /// Every registration, ordered by alias.
    fn list_all(&self) -> AdminResult<Vec<ClusterRegistration>>;

    fn find_by_alias(&self, alias: &Alias) -> AdminResult<Option<ClusterRegistration>>;

    /// Inserts or replaces the registration for its alias.
    fn save(&self, registration: &ClusterRegistration) -> AdminResult<()>;

    /// Returns whether a registration was updated.
    fn update_conn_state_by_alias(&self, alias: &Alias, state: ConnState) -> AdminResult<bool>;

    /// Updates every registration with these hosts. Returns how many matched.
    fn update_conn_state_by_hosts(&self, hosts: &str, state: ConnState) -> AdminResult<usize>;

    /// Returns whether a registration was removed.
    fn delete_by_alias(&self, alias: &Alias) -> AdminResult<bool>;
}

/// In-memory store, for tests and ephemeral deployments.
#[derive(Debug, Default)]
pub struct MemoryRegistrationStore {
    records: Mutex<BTreeMap<Alias, ClusterRegistration>>,
}

impl MemoryRegistrationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RegistrationStore for MemoryRegistrationStore {
    fn list_all(&self) -> AdminResult<Vec<ClusterRegistration>> {
        Ok(self.records.lock().unwrap().values().cloned().collect())
    }

    fn find_by_alias(&self, alias: &Alias) -> AdminResult<Option<ClusterRegistration>> {
        Ok(self.records.lock().unwrap().get(alias).cloned())
    }

    fn save(&self, registration: &ClusterRegistration) -> AdminResult<()> {
        self.records
            .lock()
            .unwrap()
            .insert(registration.alias.clone(), registration.clone());
        Ok(())
    }

    fn update_conn_state_by_alias(&self, alias: &Alias, state: ConnState) -> AdminResult<bool> {
        let mut records = self.records.lock().unwrap();
        Ok(match records.get_mut(alias) {
            Some(record) => {
                record.conn_state = state;
                record.updated_at = Utc::now();
                true
            }
            None => false,
        })
    }

    fn update_conn_state_by_hosts(&self, hosts: &str, state: ConnState) -> AdminResult<usize> {
        let mut records = self.records.lock().unwrap();
        let now = Utc::now();
        let mut updated = 0;
        for record in records.values_mut().filter(|r| r.hosts == hosts) {
            record.conn_state = state;
            record.updated_at = now;
            updated += 1;
        }
        Ok(updated)
    }

    fn delete_by_alias(&self, alias: &Alias) -> AdminResult<bool> {
        Ok(self.records.lock().unwrap().remove(alias).is_some())
    }
}
