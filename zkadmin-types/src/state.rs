//! Connection-state labels.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of one client session.
///
/// ```text
/// Disconnected -> Connecting -> Connected <-> Suspended
///        any non-terminal state -> Lost | Closed
/// ```
///
/// `Lost` and `Closed` are terminal: a handle in either state is discarded and
/// a new one is created to reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnState {
    /// Created but not yet asked to connect.
    #[default]
    Disconnected,
    /// Session establishment in progress.
    Connecting,
    /// Session established and usable.
    Connected,
    /// Transient network loss; the session may still recover.
    Suspended,
    /// Session expired or could never be established.
    Lost,
    /// Explicitly closed.
    Closed,
}

impl ConnState {
    /// Every state, in lifecycle order.
    pub const ALL: [ConnState; 6] = [
        ConnState::Disconnected,
        ConnState::Connecting,
        ConnState::Connected,
        ConnState::Suspended,
        ConnState::Lost,
        ConnState::Closed,
    ];

    /// The label persisted with registrations and pushed to front-ends.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ConnState::Disconnected => "DISCONNECTED",
            ConnState::Connecting => "CONNECTING",
            ConnState::Connected => "CONNECTED",
            ConnState::Suspended => "SUSPENDED",
            ConnState::Lost => "LOST",
            ConnState::Closed => "CLOSED",
        }
    }

    /// Whether the session is currently usable.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self, ConnState::Connected)
    }

    /// Whether no further transition can leave this state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, ConnState::Lost | ConnState::Closed)
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(&self, next: ConnState) -> bool {
        use ConnState::*;
        match (*self, next) {
            (Lost | Closed, _) => false,
            (_, Lost | Closed) => true,
            (Disconnected, Connecting) => true,
            (Connecting, Connected | Suspended) => true,
            (Connected, Suspended) => true,
            (Suspended, Connected) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ConnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConnState::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::InvalidState(s.to_string()))
    }
}
