use crate::notify::{NotificationSink, StateNotification};
use crate::store::RegistrationStore;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use zkadmin_client::{StateChange, StateObserver};
use zkadmin_types::{Alias, ConnState};

enum StateWrite {
    Update { alias: Alias, state: ConnState },
    Flush(oneshot::Sender<()>),
}

/// Persists connection states on the blocking pool, one write at a time and
/// in the order they were queued.
#[derive(Clone)]
pub struct StateWriter {
    queue: mpsc::UnboundedSender<StateWrite>,
}

impl StateWriter {
    /// Spawns the writer task. Must be called from within a Tokio runtime.
    ///
    /// The task ends once every clone of the writer is dropped.
    pub fn spawn(store: Arc<dyn RegistrationStore>) -> Self {
        let (queue, mut pending) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Some(write) = pending.recv().await {
                match write {
                    StateWrite::Update { alias, state } => persist(&store, alias, state).await,
                    StateWrite::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
            debug!("state writer stopped");
        });
        Self { queue }
    }

    /// Queues a state write without waiting for it.
    pub fn enqueue(&self, alias: Alias, state: ConnState) {
        if self.queue.send(StateWrite::Update { alias, state }).is_err() {
            debug!("state writer gone, write dropped");
        }
    }

    /// Waits until every write queued before this call has been applied.
    pub async fn flush(&self) {
        let (done, applied) = oneshot::channel();
        if self.queue.send(StateWrite::Flush(done)).is_ok() {
            let _ = applied.await;
        }
    }
}

async fn persist(store: &Arc<dyn RegistrationStore>, alias: Alias, state: ConnState) {
    let store = Arc::clone(store);
    let target = alias.clone();
    let result =
        tokio::task::spawn_blocking(move || store.update_conn_state_by_alias(&target, state)).await;
    match result {
        Ok(Ok(true)) => {}
        Ok(Ok(false)) => debug!(alias = %alias, "no registration to update"),
        Ok(Err(e)) => warn!(
            alias = %alias,
            state = %state,
            "failed to persist connection state: {}",
            e
        ),
        Err(e) => warn!(alias = %alias, "state write task failed: {}", e),
    }
}

/// Queues every transition for persistence and forwards it to the
/// notification sink.
///
/// Persistence is best-effort and happens off the transition path: a slow or
/// failing store never delays the notification.
pub struct ConnStateObserver {
    writer: StateWriter,
    sink: Arc<dyn NotificationSink>,
}

impl ConnStateObserver {
    pub fn new(writer: StateWriter, sink: Arc<dyn NotificationSink>) -> Self {
        Self { writer, sink }
    }
}

impl StateObserver for ConnStateObserver {
    fn on_state_changed(&self, change: &StateChange) {
        self.writer.enqueue(change.alias.clone(), change.current);
        self.sink.publish(StateNotification {
            alias: change.alias.clone(),
            conn_state: change.current,
        });
    }
}
