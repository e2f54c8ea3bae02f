//! Error types for administrative operations.

use thiserror::Error;
use zkadmin_client::ClientError;
use zkadmin_types::Alias;

/// Result type for administrative operations.
pub type AdminResult<T> = Result<T, AdminError>;

/// Broad failure category, used by transports to pick a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    VersionConflict,
    Connectivity,
    Internal,
}

/// Errors surfaced by the registry, the tree engine and the service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdminError {
    /// A mandatory argument was missing, empty or malformed.
    #[error("invalid argument: {0}")]
    Validation(String),

    /// No handle is registered under the alias.
    #[error("no connection registered for alias {0}")]
    NoConnection(Alias),

    /// The path does not exist on the cluster.
    #[error("path not found: {0}")]
    PathNotFound(String),

    /// Reconnect was requested for a connected alias.
    #[error("alias {0} is already connected")]
    AlreadyConnected(Alias),

    /// The root node cannot be copied.
    #[error("the root node cannot be copied")]
    RootCopy,

    /// The computed paste destination already exists.
    #[error("paste destination already exists: {0}")]
    DestinationExists(String),

    /// Any other conflict with the current tree or registry state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The expected version did not match the node's current version.
    #[error("version conflict on {path}: expected version {expected}")]
    VersionConflict { path: String, expected: i32 },

    /// The session is suspended, expired or closed.
    #[error("cluster unavailable: {0}")]
    Connectivity(String),

    /// The coordination service rejected the request for another reason.
    #[error("backend error: {0}")]
    Backend(String),

    /// The registration store failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),
}

impl AdminError {
    /// Stable numeric code reported to API clients.
    pub fn code(&self) -> u32 {
        match self {
            Self::PathNotFound(_) => 10001,
            Self::VersionConflict { .. } => 10002,
            Self::NoConnection(_) => 10003,
            Self::Validation(_) => 10004,
            Self::Connectivity(_) => 10005,
            Self::AlreadyConnected(_) => 10006,
            Self::RootCopy => 10007,
            Self::DestinationExists(_) => 10008,
            Self::Conflict(_) => 10009,
            Self::Storage(_) => 10010,
            Self::Config(_) => 10011,
            Self::Backend(_) => 10012,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NoConnection(_) | Self::PathNotFound(_) => ErrorKind::NotFound,
            Self::AlreadyConnected(_)
            | Self::RootCopy
            | Self::DestinationExists(_)
            | Self::Conflict(_) => ErrorKind::Conflict,
            Self::VersionConflict { .. } => ErrorKind::VersionConflict,
            Self::Connectivity(_) => ErrorKind::Connectivity,
            Self::Backend(_) | Self::Storage(_) | Self::Config(_) => ErrorKind::Internal,
        }
    }

    /// Shorthand for a missing mandatory argument.
    pub fn missing(argument: &str) -> Self {
        Self::Validation(format!("{argument} is required"))
    }
}

impl From<ClientError> for AdminError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::NoNode(path) => Self::PathNotFound(path),
            ClientError::NodeExists(path) => Self::Conflict(format!("node already exists: {path}")),
            ClientError::NotEmpty(path) => Self::Conflict(format!("node has children: {path}")),
            ClientError::NoChildrenForEphemerals(path) => {
                Self::Conflict(format!("ephemeral node cannot have children: {path}"))
            }
            ClientError::BadVersion { path, expected } => Self::VersionConflict { path, expected },
            ClientError::ConnectionLoss(msg) => Self::Connectivity(msg),
            ClientError::SessionExpired => Self::Connectivity("session expired".into()),
            ClientError::Closed => Self::Connectivity("connection closed".into()),
            ClientError::InvalidPath(e) => Self::Validation(e.to_string()),
            ClientError::AlreadyStarted => Self::Conflict("connection already started".into()),
            ClientError::Other(msg) => Self::Backend(msg),
        }
    }
}

impl From<zkadmin_types::Error> for AdminError {
    fn from(err: zkadmin_types::Error) -> Self {
        Self::Validation(err.to_string())
    }
}
