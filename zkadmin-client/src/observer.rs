//! Connection-state observers.

use std::sync::Mutex;
use zkadmin_types::{Alias, ConnState};

/// One observed connection-state transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    pub alias: Alias,
    pub hosts: String,
    pub previous: ConnState,
    pub current: ConnState,
}

/// Receives every state transition of the handles it is attached to.
///
/// Invoked synchronously on the context that detected the transition, in the
/// order transitions happen, so implementations must not block on slow I/O.
pub trait StateObserver: Send + Sync {
    fn on_state_changed(&self, change: &StateChange);
}

impl<F> StateObserver for F
where
    F: Fn(&StateChange) + Send + Sync,
{
    fn on_state_changed(&self, change: &StateChange) {
        self(change)
    }
}

/// Observer that keeps every change it sees, for inspection.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    changes: Mutex<Vec<StateChange>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Changes recorded so far, oldest first.
    pub fn changes(&self) -> Vec<StateChange> {
        self.changes.lock().unwrap().clone()
    }

    /// Just the target states, oldest first.
    pub fn states(&self) -> Vec<ConnState> {
        self.changes
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.current)
            .collect()
    }
}

impl StateObserver for RecordingObserver {
    fn on_state_changed(&self, change: &StateChange) {
        self.changes.lock().unwrap().push(change.clone());
    }
}
