//! Local lifecycle notifications.

use serde::{Deserialize, Serialize};

use crate::state::ConnectionState;

/// The lifecycle step a [`MetaNotification`] reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetaAction {
    /// A handshake request was sent.
    Handshake,
    /// The handshake reply was processed.
    Handshook,
    /// A connect reply arrived, or a connect failed.
    Connect,
    /// The session was disconnected locally.
    Disconnect,
}

/// Published on every handshake, handshake reply, connect outcome and
/// disconnect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaNotification {
    pub action: MetaAction,
    pub successful: bool,
    /// Session state after the step was applied.
    pub state: ConnectionState,
}

impl MetaNotification {
    pub const fn new(action: MetaAction, successful: bool, state: ConnectionState) -> Self {
        Self {
            action,
            successful,
            state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_like_the_wire_notification() {
        let note = MetaNotification::new(MetaAction::Handshook, true, ConnectionState::Connecting);
        assert_eq!(
            serde_json::to_value(note).unwrap(),
            serde_json::json!({"action": "handshook", "successful": true, "state": "CONNECTING"})
        );
    }
}
