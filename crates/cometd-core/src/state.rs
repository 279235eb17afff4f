//! Client connection state.

use serde::{Deserialize, Serialize};

/// Externally visible state of a client session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    /// No session, or the session finished disconnecting.
    #[default]
    Disconnected,
    /// Handshake sent or succeeded, first connect not yet acknowledged.
    Connecting,
    /// Tunnel established.
    Connected,
    /// Disconnect requested while a poll is still outstanding.
    Disconnecting,
}

impl ConnectionState {
    /// Derive the state from the session's `initialized` and `connected` flags.
    pub const fn from_flags(initialized: bool, connected: bool) -> Self {
        match (initialized, connected) {
            (false, false) => Self::Disconnected,
            (true, false) => Self::Connecting,
            (true, true) => Self::Connected,
            (false, true) => Self::Disconnecting,
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "DISCONNECTED"),
            Self::Connecting => write!(f, "CONNECTING"),
            Self::Connected => write!(f, "CONNECTED"),
            Self::Disconnecting => write!(f, "DISCONNECTING"),
        }
    }
}
