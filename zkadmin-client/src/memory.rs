//! In-process coordination service.
//!
//! [`MemoryEnsemble`] keeps a versioned node tree with the service's
//! semantics: per-node data versions, child-list versions that feed
//! sequential suffixes, ephemeral ownership and `NotEmpty` deletes. It has no
//! replication; it exists so that handles, the tree engine and the HTTP glue
//! can run without a live cluster, and so tests can inject session faults.

use crate::error::{ClientError, ClientResult};
use crate::handle::StateReporter;
use crate::session::{Connector, Session};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;
use zkadmin_types::{path, AclPolicy, ConnState, CreateMode, NodeStat};

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

struct ZNode {
    data: Vec<u8>,
    stat: NodeStat,
    children: BTreeSet<String>,
}

struct Tree {
    nodes: HashMap<String, ZNode>,
    zxid: i64,
}

impl Tree {
    fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            path::ROOT.to_string(),
            ZNode {
                data: Vec::new(),
                stat: NodeStat::default(),
                children: BTreeSet::new(),
            },
        );
        Self { nodes, zxid: 0 }
    }

    fn stat(&self, path: &str) -> Option<NodeStat> {
        self.nodes.get(path).map(|n| n.stat)
    }

    fn get(&self, path: &str) -> ClientResult<(Vec<u8>, NodeStat)> {
        self.nodes
            .get(path)
            .map(|n| (n.data.clone(), n.stat))
            .ok_or_else(|| ClientError::NoNode(path.to_string()))
    }

    fn children(&self, path: &str) -> ClientResult<Vec<String>> {
        self.nodes
            .get(path)
            .map(|n| n.children.iter().cloned().collect())
            .ok_or_else(|| ClientError::NoNode(path.to_string()))
    }

    fn create(
        &mut self,
        path: &str,
        data: &[u8],
        mode: CreateMode,
        owner: i64,
    ) -> ClientResult<String> {
        let parent_path =
            path::parent(path).ok_or_else(|| ClientError::NodeExists(path.to_string()))?;
        let zxid = self.zxid + 1;
        let now = now_millis();

        let parent = self
            .nodes
            .get_mut(parent_path)
            .ok_or_else(|| ClientError::NoNode(parent_path.to_string()))?;
        if parent.stat.is_ephemeral() {
            return Err(ClientError::NoChildrenForEphemerals(parent_path.to_string()));
        }

        let created = if mode.is_sequential() {
            format!("{path}{:010}", parent.stat.cversion)
        } else {
            path.to_string()
        };
        let name = path::basename(&created).to_string();
        if parent.children.contains(&name) {
            return Err(ClientError::NodeExists(created));
        }

        parent.children.insert(name);
        parent.stat.cversion += 1;
        parent.stat.num_children += 1;
        parent.stat.pzxid = zxid;
        self.zxid = zxid;

        let stat = NodeStat {
            czxid: zxid,
            mzxid: zxid,
            pzxid: zxid,
            ctime: now,
            mtime: now,
            version: 0,
            cversion: 0,
            aversion: 0,
            ephemeral_owner: if mode.is_ephemeral() { owner } else { 0 },
            data_length: data.len() as i32,
            num_children: 0,
        };
        self.nodes.insert(
            created.clone(),
            ZNode {
                data: data.to_vec(),
                stat,
                children: BTreeSet::new(),
            },
        );
        Ok(created)
    }

    fn set_data(&mut self, path: &str, data: &[u8], version: i32) -> ClientResult<NodeStat> {
        let node = self
            .nodes
            .get_mut(path)
            .ok_or_else(|| ClientError::NoNode(path.to_string()))?;
        if version != -1 && version != node.stat.version {
            return Err(ClientError::BadVersion {
                path: path.to_string(),
                expected: version,
            });
        }

        self.zxid += 1;
        node.data = data.to_vec();
        node.stat.version += 1;
        node.stat.mzxid = self.zxid;
        node.stat.mtime = now_millis();
        node.stat.data_length = data.len() as i32;
        Ok(node.stat)
    }

    fn delete(&mut self, path: &str, version: i32) -> ClientResult<()> {
        let Some(parent_path) = path::parent(path) else {
            return Err(ClientError::Other("the root node cannot be deleted".into()));
        };
        let node = self
            .nodes
            .get(path)
            .ok_or_else(|| ClientError::NoNode(path.to_string()))?;
        if version != -1 && version != node.stat.version {
            return Err(ClientError::BadVersion {
                path: path.to_string(),
                expected: version,
            });
        }
        if !node.children.is_empty() {
            return Err(ClientError::NotEmpty(path.to_string()));
        }

        self.nodes.remove(path);
        self.zxid += 1;
        if let Some(parent) = self.nodes.get_mut(parent_path) {
            parent.children.remove(path::basename(path));
            parent.stat.num_children -= 1;
            parent.stat.cversion += 1;
            parent.stat.pzxid = self.zxid;
        }
        Ok(())
    }

    fn remove_ephemerals(&mut self, owner: i64) -> usize {
        let owned: Vec<String> = self
            .nodes
            .iter()
            .filter(|(_, n)| n.stat.ephemeral_owner == owner)
            .map(|(p, _)| p.clone())
            .collect();
        owned
            .iter()
            .filter(|p| self.delete(p, -1).is_ok())
            .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionStatus {
    Active,
    Suspended,
    Expired,
}

struct SessionEntry {
    status: SessionStatus,
    reporter: StateReporter,
}

struct EnsembleInner {
    tree: Mutex<Tree>,
    sessions: Mutex<HashMap<i64, SessionEntry>>,
    next_session_id: AtomicI64,
    available: AtomicBool,
    creates: AtomicUsize,
}

impl EnsembleInner {
    fn status(&self, id: i64) -> Option<SessionStatus> {
        self.sessions.lock().unwrap().get(&id).map(|s| s.status)
    }

    /// Moves every session matching `from` to `to` and returns their reporters.
    fn shift_sessions(
        &self,
        from: &[SessionStatus],
        to: SessionStatus,
    ) -> Vec<(i64, StateReporter)> {
        let mut sessions = self.sessions.lock().unwrap();
        sessions
            .iter_mut()
            .filter(|(_, s)| from.contains(&s.status))
            .map(|(id, s)| {
                s.status = to;
                (*id, s.reporter.clone())
            })
            .collect()
    }
}

/// A single-process stand-in for one coordination-service cluster.
///
/// Cloning yields another reference to the same tree.
#[derive(Clone)]
pub struct MemoryEnsemble {
    inner: Arc<EnsembleInner>,
}

impl Default for MemoryEnsemble {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEnsemble {
    /// Creates an ensemble holding only the root node.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(EnsembleInner {
                tree: Mutex::new(Tree::new()),
                sessions: Mutex::new(HashMap::new()),
                next_session_id: AtomicI64::new(1),
                available: AtomicBool::new(true),
                creates: AtomicUsize::new(0),
            }),
        }
    }

    /// Opens a new session. Fails while the ensemble is unavailable.
    pub fn open_session(&self, reporter: StateReporter) -> ClientResult<Arc<dyn Session>> {
        if !self.inner.available.load(Ordering::SeqCst) {
            return Err(ClientError::ConnectionLoss("ensemble unreachable".into()));
        }
        let id = self.inner.next_session_id.fetch_add(1, Ordering::SeqCst);
        self.inner.sessions.lock().unwrap().insert(
            id,
            SessionEntry {
                status: SessionStatus::Active,
                reporter,
            },
        );
        debug!("memory ensemble opened session {}", id);
        Ok(Arc::new(MemorySession {
            id,
            ensemble: Arc::clone(&self.inner),
        }))
    }

    // ── Fault injection ──────────────────────────────────────────

    /// Makes new connection attempts fail (or succeed again).
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    /// Simulates transient network loss for every active session.
    pub fn suspend(&self) {
        for (_, reporter) in self
            .inner
            .shift_sessions(&[SessionStatus::Active], SessionStatus::Suspended)
        {
            reporter.report(ConnState::Suspended);
        }
    }

    /// Recovers every suspended session.
    pub fn resume(&self) {
        for (_, reporter) in self
            .inner
            .shift_sessions(&[SessionStatus::Suspended], SessionStatus::Active)
        {
            reporter.report(ConnState::Connected);
        }
    }

    /// Expires every live session and drops the ephemeral nodes they own.
    pub fn expire_sessions(&self) {
        let expired = self.inner.shift_sessions(
            &[SessionStatus::Active, SessionStatus::Suspended],
            SessionStatus::Expired,
        );
        {
            let mut tree = self.inner.tree.lock().unwrap();
            for (id, _) in &expired {
                tree.remove_ephemerals(*id);
            }
        }
        for (_, reporter) in expired {
            reporter.report(ConnState::Lost);
        }
    }

    // ── Inspection ───────────────────────────────────────────────

    /// Number of sessions that are active or suspended.
    pub fn live_sessions(&self) -> usize {
        self.inner
            .sessions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.status != SessionStatus::Expired)
            .count()
    }

    /// Number of successful node creations since the ensemble was built.
    pub fn create_count(&self) -> usize {
        self.inner.creates.load(Ordering::SeqCst)
    }

    /// Reads a node directly, bypassing sessions.
    pub fn read(&self, path: &str) -> Option<(Vec<u8>, NodeStat)> {
        self.inner.tree.lock().unwrap().get(path).ok()
    }

    /// Whether a node exists.
    pub fn contains(&self, path: &str) -> bool {
        self.inner.tree.lock().unwrap().stat(path).is_some()
    }

    /// Creates a persistent node and any missing ancestors, bypassing
    /// sessions. Existing nodes keep their data.
    pub fn seed(&self, path: &str, data: &[u8]) -> ClientResult<()> {
        path::validate(path)?;
        let mut tree = self.inner.tree.lock().unwrap();
        let mut current = String::new();
        let segments: Vec<&str> = path.split(path::SEPARATOR).filter(|s| !s.is_empty()).collect();
        for (i, segment) in segments.iter().enumerate() {
            current.push(path::SEPARATOR);
            current.push_str(segment);
            if tree.stat(&current).is_some() {
                continue;
            }
            let payload: &[u8] = if i + 1 == segments.len() { data } else { &[] };
            tree.create(&current, payload, CreateMode::Persistent, 0)?;
        }
        Ok(())
    }
}

struct MemorySession {
    id: i64,
    ensemble: Arc<EnsembleInner>,
}

impl MemorySession {
    fn check(&self) -> ClientResult<()> {
        match self.ensemble.status(self.id) {
            Some(SessionStatus::Active) => Ok(()),
            Some(SessionStatus::Suspended) => {
                Err(ClientError::ConnectionLoss("session suspended".into()))
            }
            Some(SessionStatus::Expired) => Err(ClientError::SessionExpired),
            None => Err(ClientError::Closed),
        }
    }
}

#[async_trait]
impl Session for MemorySession {
    async fn children(&self, path: &str) -> ClientResult<Vec<String>> {
        self.check()?;
        self.ensemble.tree.lock().unwrap().children(path)
    }

    async fn exists(&self, path: &str) -> ClientResult<Option<NodeStat>> {
        self.check()?;
        Ok(self.ensemble.tree.lock().unwrap().stat(path))
    }

    async fn get_data(&self, path: &str) -> ClientResult<(Vec<u8>, NodeStat)> {
        self.check()?;
        self.ensemble.tree.lock().unwrap().get(path)
    }

    async fn create(
        &self,
        path: &str,
        data: &[u8],
        _acl: AclPolicy,
        mode: CreateMode,
    ) -> ClientResult<String> {
        self.check()?;
        let created = self
            .ensemble
            .tree
            .lock()
            .unwrap()
            .create(path, data, mode, self.id)?;
        self.ensemble.creates.fetch_add(1, Ordering::SeqCst);
        Ok(created)
    }

    async fn set_data(&self, path: &str, data: &[u8], version: i32) -> ClientResult<NodeStat> {
        self.check()?;
        self.ensemble
            .tree
            .lock()
            .unwrap()
            .set_data(path, data, version)
    }

    async fn delete(&self, path: &str, version: i32) -> ClientResult<()> {
        self.check()?;
        self.ensemble.tree.lock().unwrap().delete(path, version)
    }

    async fn close(&self) {
        let removed = self.ensemble.sessions.lock().unwrap().remove(&self.id);
        if removed.is_some() {
            let dropped = self.ensemble.tree.lock().unwrap().remove_ephemerals(self.id);
            debug!(
                "memory ensemble closed session {} ({} ephemeral nodes dropped)",
                self.id, dropped
            );
        }
    }
}

/// Connects handles to in-process ensembles keyed by connection string.
pub struct MemoryConnector {
    ensembles: Mutex<HashMap<String, MemoryEnsemble>>,
    auto_provision: bool,
}

impl Default for MemoryConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryConnector {
    /// A connector that creates an empty ensemble for any unknown hosts.
    pub fn new() -> Self {
        Self {
            ensembles: Mutex::new(HashMap::new()),
            auto_provision: true,
        }
    }

    /// A connector that only reaches explicitly registered ensembles.
    pub fn strict() -> Self {
        Self {
            ensembles: Mutex::new(HashMap::new()),
            auto_provision: false,
        }
    }

    /// Makes `ensemble` reachable at `hosts`.
    pub fn register(&self, hosts: impl Into<String>, ensemble: MemoryEnsemble) {
        self.ensembles.lock().unwrap().insert(hosts.into(), ensemble);
    }

    /// The ensemble reachable at `hosts`, if any.
    pub fn ensemble(&self, hosts: &str) -> Option<MemoryEnsemble> {
        self.ensembles.lock().unwrap().get(hosts).cloned()
    }

    fn resolve(&self, hosts: &str) -> Option<MemoryEnsemble> {
        let mut ensembles = self.ensembles.lock().unwrap();
        if let Some(ensemble) = ensembles.get(hosts) {
            return Some(ensemble.clone());
        }
        if !self.auto_provision {
            return None;
        }
        let ensemble = MemoryEnsemble::new();
        ensembles.insert(hosts.to_string(), ensemble.clone());
        Some(ensemble)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn connect(
        &self,
        hosts: &str,
        reporter: StateReporter,
    ) -> ClientResult<Arc<dyn Session>> {
        let ensemble = self
            .resolve(hosts)
            .ok_or_else(|| ClientError::ConnectionLoss(format!("no ensemble at {hosts}")))?;
        ensemble.open_session(reporter)
    }
}
