//! Error types for the client layer.

use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors reported by a session or a connection handle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The node does not exist.
    #[error("node does not exist: {0}")]
    NoNode(String),

    /// The node already exists.
    #[error("node already exists: {0}")]
    NodeExists(String),

    /// The expected version did not match the node's current version.
    #[error("version mismatch at {path}: expected {expected}")]
    BadVersion { path: String, expected: i32 },

    /// The node still has children.
    #[error("node has children: {0}")]
    NotEmpty(String),

    /// Ephemeral nodes cannot have children.
    #[error("ephemeral node cannot have children: {0}")]
    NoChildrenForEphemerals(String),

    /// The session is transiently unavailable.
    #[error("connection loss: {0}")]
    ConnectionLoss(String),

    /// The session expired on the service side.
    #[error("session expired")]
    SessionExpired,

    /// The handle or session was closed locally.
    #[error("session closed")]
    Closed,

    /// The path is malformed.
    #[error(transparent)]
    InvalidPath(#[from] zkadmin_types::Error),

    /// `connect` was called more than once on the same handle.
    #[error("connect already started for this handle")]
    AlreadyStarted,

    /// Anything else the backend reports.
    #[error("coordination service error: {0}")]
    Other(String),
}

impl ClientError {
    /// Whether the error means the session, not the request, is at fault.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            ClientError::ConnectionLoss(_) | ClientError::SessionExpired | ClientError::Closed
        )
    }
}
