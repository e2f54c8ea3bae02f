//! Push notifications of connection-state changes.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tokio::sync::broadcast;
use tracing::debug;
use zkadmin_types::{Alias, ConnState};

/// The message pushed to front-ends on every transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateNotification {
    pub alias: Alias,
    pub conn_state: ConnState,
}

/// Fire-and-forget destination for state notifications.
///
/// Called synchronously from state observers, so `publish` must not block.
pub trait NotificationSink: Send + Sync {
    fn publish(&self, notification: StateNotification);
}

/// Fans notifications out to any number of subscribers.
///
/// A subscriber that falls more than `capacity` events behind loses the
/// oldest ones. Publishing with no subscribers drops the event.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    sender: broadcast::Sender<StateNotification>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateNotification> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl NotificationSink for BroadcastSink {
    fn publish(&self, notification: StateNotification) {
        if let Err(broadcast::error::SendError(dropped)) = self.sender.send(notification) {
            debug!("no subscribers for state of {}", dropped.alias);
        }
    }
}

/// Keeps every published notification, for inspection.
#[derive(Debug, Default)]
pub struct RecordingSink {
    received: Mutex<Vec<StateNotification>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications received so far, oldest first.
    pub fn received(&self) -> Vec<StateNotification> {
        self.received.lock().unwrap().clone()
    }
}

impl NotificationSink for RecordingSink {
    fn publish(&self, notification: StateNotification) {
        self.received.lock().unwrap().push(notification);
    }
}
