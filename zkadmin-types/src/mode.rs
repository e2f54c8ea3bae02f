//! Node creation options.

use crate::Error;
use serde::{Deserialize, Serialize};

/// Persistence and numbering semantics of a created node.
///
/// Serialized as the coordination service's integer flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum CreateMode {
    #[default]
    Persistent,
    Ephemeral,
    PersistentSequential,
    EphemeralSequential,
    Container,
}

impl CreateMode {
    /// Maps a wire flag onto a mode.
    pub fn from_flag(flag: i32) -> Result<Self, Error> {
        match flag {
            0 => Ok(CreateMode::Persistent),
            1 => Ok(CreateMode::Ephemeral),
            2 => Ok(CreateMode::PersistentSequential),
            3 => Ok(CreateMode::EphemeralSequential),
            4 => Ok(CreateMode::Container),
            other => Err(Error::InvalidCreateMode(other)),
        }
    }

    /// The wire flag for this mode.
    #[must_use]
    pub const fn flag(&self) -> i32 {
        match self {
            CreateMode::Persistent => 0,
            CreateMode::Ephemeral => 1,
            CreateMode::PersistentSequential => 2,
            CreateMode::EphemeralSequential => 3,
            CreateMode::Container => 4,
        }
    }

    /// Whether the service appends a unique suffix to the requested path.
    #[must_use]
    pub const fn is_sequential(&self) -> bool {
        matches!(
            self,
            CreateMode::PersistentSequential | CreateMode::EphemeralSequential
        )
    }

    /// Whether the node is removed when the creating session ends.
    #[must_use]
    pub const fn is_ephemeral(&self) -> bool {
        matches!(self, CreateMode::Ephemeral | CreateMode::EphemeralSequential)
    }
}

impl TryFrom<i32> for CreateMode {
    type Error = Error;

    fn try_from(flag: i32) -> Result<Self, Self::Error> {
        Self::from_flag(flag)
    }
}

impl From<CreateMode> for i32 {
    fn from(mode: CreateMode) -> Self {
        mode.flag()
    }
}

/// Access control applied to a newly created node.
///
/// These are the coordination service's well-known ACL sets; an admin tool
/// never needs anything finer-grained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AclPolicy {
    /// `world:anyone` with every permission.
    #[default]
    AnyoneAll,
    /// Every permission for the authenticated creator only.
    CreatorAll,
    /// `world:anyone` read-only.
    AnyoneRead,
}
