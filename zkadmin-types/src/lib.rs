//! Core type definitions for zkadmin.
//!
//! This crate defines the plain data shared by every layer of the control
//! plane:
//! - Cluster aliases and registration records
//! - Connection-state labels
//! - Node metadata, data payloads and the lazily expanded path tree
//! - Path normalization and joining (`path`)
//!
//! Nothing here performs I/O.

mod ids;
mod mode;
mod node;
pub mod path;
mod registration;
mod state;

pub use ids::Alias;
pub use mode::{AclPolicy, CreateMode};
pub use node::{NodeStat, PathData, PathNode};
pub use registration::ClusterRegistration;
pub use state::ConnState;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("invalid alias: {0:?}")]
    InvalidAlias(String),

    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("invalid create mode flag: {0}")]
    InvalidCreateMode(i32),

    #[error("invalid connection state: {0:?}")]
    InvalidState(String),
}
