//! Session abstraction.
//!
//! Defines the primitives a coordination-service client must offer so that
//! connection handles can work with any backend: the in-process
//! [`MemoryEnsemble`](crate::memory::MemoryEnsemble) or a real ZooKeeper
//! cluster.

use crate::error::ClientResult;
use crate::handle::StateReporter;
use async_trait::async_trait;
use std::sync::Arc;
use zkadmin_types::{AclPolicy, CreateMode, NodeStat};

/// One live client session to one cluster.
///
/// Paths handed to a session are already validated. Versions are passed
/// through untouched; `-1` means "any version" as on the service itself.
#[async_trait]
pub trait Session: Send + Sync {
    /// Names of the immediate children of `path`.
    async fn children(&self, path: &str) -> ClientResult<Vec<String>>;

    /// Metadata of `path`, or `None` if it does not exist.
    async fn exists(&self, path: &str) -> ClientResult<Option<NodeStat>>;

    /// Payload and metadata of `path`.
    async fn get_data(&self, path: &str) -> ClientResult<(Vec<u8>, NodeStat)>;

    /// Creates `path` and returns the path actually created, which carries a
    /// service-assigned suffix in sequential modes.
    async fn create(
        &self,
        path: &str,
        data: &[u8],
        acl: AclPolicy,
        mode: CreateMode,
    ) -> ClientResult<String>;

    /// Replaces the payload if `version` matches.
    async fn set_data(&self, path: &str, data: &[u8], version: i32) -> ClientResult<NodeStat>;

    /// Deletes a childless node if `version` matches.
    async fn delete(&self, path: &str, version: i32) -> ClientResult<()>;

    /// Ends the session and releases its resources.
    async fn close(&self);
}

/// Establishes sessions.
///
/// `connect` resolves once the session is usable. Transitions after that
/// (suspension, recovery, expiry) are pushed through `reporter` from the
/// backend's own event machinery.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Name of the backend, for logs.
    fn backend_name(&self) -> &'static str;

    /// Opens a session to the cluster behind `hosts`.
    async fn connect(&self, hosts: &str, reporter: StateReporter)
        -> ClientResult<Arc<dyn Session>>;
}
