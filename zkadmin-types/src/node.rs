//! Node metadata and the request/response shapes built from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata the coordination service keeps for every node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStat {
    /// Transaction id of the create.
    pub czxid: i64,
    /// Transaction id of the last data change.
    pub mzxid: i64,
    /// Transaction id of the last change to the child list.
    pub pzxid: i64,
    /// Create time, milliseconds since the epoch.
    pub ctime: i64,
    /// Last modification time, milliseconds since the epoch.
    pub mtime: i64,
    /// Data version; the optimistic-concurrency token for writes and deletes.
    pub version: i32,
    /// Child-list version.
    pub cversion: i32,
    /// ACL version.
    pub aversion: i32,
    /// Owning session id for ephemeral nodes, zero otherwise.
    pub ephemeral_owner: i64,
    /// Length of the data payload in bytes.
    pub data_length: i32,
    /// Number of immediate children.
    pub num_children: i32,
}

impl NodeStat {
    /// Whether the node has at least one child.
    #[must_use]
    pub fn has_children(&self) -> bool {
        self.num_children > 0
    }

    /// Whether the node is owned by a session.
    #[must_use]
    pub fn is_ephemeral(&self) -> bool {
        self.ephemeral_owner != 0
    }

    /// Create time as a UTC timestamp.
    #[must_use]
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.ctime)
    }

    /// Last modification time as a UTC timestamp.
    #[must_use]
    pub fn modified_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.mtime)
    }
}

/// One entry of a tree listing, expanded one level at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathNode {
    /// Absolute path.
    pub id: String,
    /// Last path segment, or the separator for the synthetic root.
    pub name: String,
    /// Whether the node has at least one child.
    pub has_children: bool,
    /// Set when `children` has been populated.
    pub open: bool,
    /// Populated only for the synthetic root of a root-level listing.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<PathNode>,
}

impl PathNode {
    /// A collapsed listing entry.
    pub fn leaf(id: impl Into<String>, name: impl Into<String>, has_children: bool) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            has_children,
            open: false,
            children: Vec::new(),
        }
    }

    /// An expanded entry whose children were listed in the same response.
    pub fn expanded(id: impl Into<String>, name: impl Into<String>, children: Vec<PathNode>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            has_children: true,
            open: true,
            children,
        }
    }
}

/// A node's payload together with the metadata read alongside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathData {
    /// Payload decoded as UTF-8; invalid sequences are replaced.
    pub value: String,
    pub stat: NodeStat,
}

impl PathData {
    pub fn new(raw: &[u8], stat: NodeStat) -> Self {
        Self {
            value: String::from_utf8_lossy(raw).into_owned(),
            stat,
        }
    }

    /// The version to pass back for an optimistic update or delete.
    #[must_use]
    pub fn version(&self) -> i32 {
        self.stat.version
    }
}
