//! Connection handles.
//!
//! A [`ConnectionHandle`] owns exactly one session to one cluster and tracks
//! its lifecycle. Connecting is asynchronous from the caller's point of view:
//! [`ConnectionHandle::connect`] returns immediately and completion is signaled
//! through the attached [`StateObserver`]s.
//!
//! Every transition goes through a single per-handle lock, so observers see the
//! transitions of one handle exactly once and in order, whichever task (the
//! connect task, the backend's event loop, or a caller closing the handle)
//! detected them.

use crate::error::{ClientError, ClientResult};
use crate::observer::{StateChange, StateObserver};
use crate::session::{Connector, Session};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use zkadmin_types::{path, AclPolicy, Alias, ConnState, CreateMode, NodeStat};

/// Builder for a [`ConnectionHandle`]. Observers can only be attached here.
pub struct HandleBuilder {
    alias: Alias,
    hosts: String,
    connector: Arc<dyn Connector>,
    observers: Vec<Arc<dyn StateObserver>>,
}

impl HandleBuilder {
    /// Attaches an observer. Observers are invoked in the order attached.
    pub fn observer(mut self, observer: Arc<dyn StateObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Builds a handle in the `Disconnected` state.
    pub fn build(self) -> ConnectionHandle {
        let (state, _) = watch::channel(ConnState::Disconnected);
        ConnectionHandle {
            inner: Arc::new(HandleInner {
                alias: self.alias,
                hosts: self.hosts,
                connector: self.connector,
                observers: self.observers,
                transition: Mutex::new(()),
                state,
                session: RwLock::new(None),
                connect_task: Mutex::new(None),
                started: AtomicBool::new(false),
            }),
        }
    }
}

struct HandleInner {
    alias: Alias,
    hosts: String,
    connector: Arc<dyn Connector>,
    observers: Vec<Arc<dyn StateObserver>>,
    /// Serializes transitions and session installation.
    transition: Mutex<()>,
    state: watch::Sender<ConnState>,
    session: RwLock<Option<Arc<dyn Session>>>,
    connect_task: Mutex<Option<JoinHandle<()>>>,
    started: AtomicBool,
}

impl HandleInner {
    fn state(&self) -> ConnState {
        *self.state.borrow()
    }

    fn transition(&self, next: ConnState) -> bool {
        let _guard = self.transition.lock().unwrap();
        let previous = self.state();
        if !previous.can_transition_to(next) {
            if previous != next {
                debug!(
                    alias = %self.alias,
                    %previous,
                    ignored = %next,
                    "ignoring invalid state transition"
                );
            }
            return false;
        }

        self.state.send_replace(next);
        debug!(alias = %self.alias, %previous, current = %next, "connection state changed");

        let change = StateChange {
            alias: self.alias.clone(),
            hosts: self.hosts.clone(),
            previous,
            current: next,
        };
        for observer in &self.observers {
            observer.on_state_changed(&change);
        }
        true
    }

    /// Stores a freshly opened session unless the handle was closed meanwhile,
    /// in which case the session is handed back for closing.
    fn install_session(&self, session: Arc<dyn Session>) -> Result<(), Arc<dyn Session>> {
        let _guard = self.transition.lock().unwrap();
        if self.state().is_terminal() {
            return Err(session);
        }
        *self.session.write().unwrap() = Some(session);
        Ok(())
    }
}

impl Drop for HandleInner {
    fn drop(&mut self) {
        if let Ok(task) = self.connect_task.get_mut() {
            if let Some(task) = task.take() {
                task.abort();
            }
        }
        let Some(session) = self.session.get_mut().ok().and_then(Option::take) else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let alias = self.alias.clone();
                runtime.spawn(async move {
                    session.close().await;
                    debug!(alias = %alias, "session of dropped handle released");
                });
            }
            Err(_) => warn!(
                alias = %self.alias,
                "handle dropped outside a runtime, session not released"
            ),
        }
    }
}

/// Pushes state transitions into the handle that created it.
///
/// Backends keep a reporter for the lifetime of the session. It holds no
/// strong reference, so a dropped handle silently ignores late reports.
#[derive(Clone)]
pub struct StateReporter {
    inner: Weak<HandleInner>,
}

impl StateReporter {
    /// A reporter attached to nothing.
    pub fn detached() -> Self {
        Self { inner: Weak::new() }
    }

    /// Reports a transition. Returns whether it was applied.
    pub fn report(&self, state: ConnState) -> bool {
        match self.inner.upgrade() {
            Some(inner) => inner.transition(state),
            None => false,
        }
    }
}

impl fmt::Debug for StateReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateReporter")
            .field("attached", &(self.inner.strong_count() > 0))
            .finish()
    }
}

/// A live client connection to one registered cluster.
///
/// Cloning yields another reference to the same handle and session.
#[derive(Clone)]
pub struct ConnectionHandle {
    inner: Arc<HandleInner>,
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("alias", &self.inner.alias)
            .field("hosts", &self.inner.hosts)
            .field("backend", &self.inner.connector.backend_name())
            .field("state", &self.state())
            .finish()
    }
}

impl ConnectionHandle {
    /// Starts building a handle for `alias` at `hosts`.
    pub fn builder(
        alias: Alias,
        hosts: impl Into<String>,
        connector: Arc<dyn Connector>,
    ) -> HandleBuilder {
        HandleBuilder {
            alias,
            hosts: hosts.into(),
            connector,
            observers: Vec::new(),
        }
    }

    /// Returns the alias this handle serves.
    pub fn alias(&self) -> &Alias {
        &self.inner.alias
    }

    /// Returns the connection string.
    pub fn hosts(&self) -> &str {
        &self.inner.hosts
    }

    /// Returns the last observed state.
    pub fn state(&self) -> ConnState {
        self.inner.state()
    }

    /// Whether the last observed state is `Connected`.
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Whether two values refer to the same handle.
    pub fn same_handle(&self, other: &ConnectionHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Subscribes to state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnState> {
        self.inner.state.subscribe()
    }

    /// Returns a reporter bound to this handle.
    pub fn reporter(&self) -> StateReporter {
        StateReporter {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Starts establishing the session in the background.
    ///
    /// Must be called from within a Tokio runtime. A handle connects at most
    /// once; reconnecting means building a new handle.
    pub fn connect(&self) -> ClientResult<()> {
        if self.state().is_terminal() {
            return Err(ClientError::Closed);
        }
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return Err(ClientError::AlreadyStarted);
        }
        self.inner.transition(ConnState::Connecting);

        let connector = Arc::clone(&self.inner.connector);
        let hosts = self.inner.hosts.clone();
        let alias = self.inner.alias.clone();
        let weak = Arc::downgrade(&self.inner);
        let reporter = self.reporter();

        let task = tokio::spawn(async move {
            let result = connector.connect(&hosts, reporter).await;
            let Some(inner) = weak.upgrade() else {
                if let Ok(session) = result {
                    session.close().await;
                }
                return;
            };
            match result {
                Ok(session) => match inner.install_session(session) {
                    Ok(()) => {
                        info!(alias = %alias, hosts = %hosts, "session established");
                        inner.transition(ConnState::Connected);
                    }
                    Err(orphan) => {
                        drop(inner);
                        orphan.close().await;
                    }
                },
                Err(e) => {
                    warn!(alias = %alias, hosts = %hosts, "failed to establish session: {}", e);
                    inner.transition(ConnState::Lost);
                }
            }
        });

        *self.inner.connect_task.lock().unwrap() = Some(task);
        Ok(())
    }

    /// Closes the handle and releases its session. Idempotent.
    ///
    /// The session is fully released when this returns. Dropping the last
    /// clone without closing releases the session in the background and
    /// notifies no observer.
    pub async fn close(&self) {
        let task = self.inner.connect_task.lock().unwrap().take();
        if let Some(task) = task {
            task.abort();
        }
        self.inner.transition(ConnState::Closed);

        let session = self.inner.session.write().unwrap().take();
        if let Some(session) = session {
            session.close().await;
            debug!(alias = %self.inner.alias, "session released");
        }
    }

    /// Waits until the state satisfies `pred`, or `timeout` elapses.
    pub async fn wait_until<F>(&self, timeout: Duration, mut pred: F) -> Option<ConnState>
    where
        F: FnMut(ConnState) -> bool,
    {
        let mut rx = self.subscribe_state();
        let reached = tokio::time::timeout(timeout, rx.wait_for(|state| pred(*state))).await;
        let state = match reached {
            Ok(Ok(state)) => Some(*state),
            _ => None,
        };
        state
    }

    /// Waits for `target`, giving up after `timeout`.
    pub async fn wait_for_state(&self, target: ConnState, timeout: Duration) -> bool {
        self.wait_until(timeout, |state| state == target).await.is_some()
    }

    fn session(&self) -> ClientResult<Arc<dyn Session>> {
        if let Some(session) = self.inner.session.read().unwrap().as_ref() {
            return Ok(Arc::clone(session));
        }
        match self.state() {
            ConnState::Closed => Err(ClientError::Closed),
            ConnState::Lost => Err(ClientError::SessionExpired),
            state => Err(ClientError::ConnectionLoss(format!(
                "{} is {}",
                self.inner.alias, state
            ))),
        }
    }

    // ── Path operations ──────────────────────────────────────────

    /// Names of the immediate children of `path`.
    pub async fn list_children_path(&self, path: &str) -> ClientResult<Vec<String>> {
        path::validate(path)?;
        self.session()?.children(path).await
    }

    /// Metadata of `path`; fails with `NoNode` if absent.
    pub async fn get_path_stat(&self, path: &str) -> ClientResult<NodeStat> {
        path::validate(path)?;
        self.session()?
            .exists(path)
            .await?
            .ok_or_else(|| ClientError::NoNode(path.to_string()))
    }

    /// Payload and metadata of `path`.
    pub async fn get_path_data(&self, path: &str) -> ClientResult<(Vec<u8>, NodeStat)> {
        path::validate(path)?;
        self.session()?.get_data(path).await
    }

    /// Creates `path`. Returns the created path, which differs from the
    /// requested one in sequential modes.
    pub async fn create_path(
        &self,
        path: &str,
        data: &[u8],
        acl: AclPolicy,
        mode: CreateMode,
    ) -> ClientResult<String> {
        path::validate(path)?;
        self.session()?.create(path, data, acl, mode).await
    }

    /// Optimistic write; fails with `BadVersion` on a stale `version`.
    pub async fn set_path_data(
        &self,
        path: &str,
        data: &[u8],
        version: i32,
    ) -> ClientResult<NodeStat> {
        path::validate(path)?;
        self.session()?.set_data(path, data, version).await
    }

    /// Optimistic delete of a childless node.
    pub async fn delete_path(&self, path: &str, version: i32) -> ClientResult<()> {
        path::validate(path)?;
        self.session()?.delete(path, version).await
    }

    /// Existence check; absence is not an error.
    pub async fn check_path_exist(&self, path: &str) -> ClientResult<bool> {
        path::validate(path)?;
        Ok(self.session()?.exists(path).await?.is_some())
    }
}
