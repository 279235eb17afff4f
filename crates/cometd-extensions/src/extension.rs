//! The extension hook trait.
//!
//! Extensions see every outgoing message before it is sent and every incoming
//! message before it is dispatched, and may replace it.

use cometd_core::Message;

/// Result of a single transform.
#[derive(Clone, Debug, PartialEq)]
pub enum Transform {
    /// Pass the message on as it was.
    Unchanged,
    /// Continue the chain with this message instead.
    Replace(Message),
}

/// Failure inside an extension. The pipeline logs it and moves on.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ExtensionError {
    #[error("malformed {field}: {reason}")]
    Malformed { field: &'static str, reason: String },
    #[error("{0}")]
    Other(String),
}

/// A message extension.
///
/// Transforms receive the message as it stands after the previous extension
/// and must not assume they run first. Extensions are shared between the
/// client handle and the session task, so state lives behind interior
/// mutability.
pub trait Extension: Send + Sync {
    fn name(&self) -> &str;

    /// Transform a message about to be sent.
    fn outgoing(&self, _message: &Message) -> Result<Transform, ExtensionError> {
        Ok(Transform::Unchanged)
    }

    /// Transform a message just received.
    fn incoming(&self, _message: &Message) -> Result<Transform, ExtensionError> {
        Ok(Transform::Unchanged)
    }

    /// Called when the server confirms a subscription.
    fn subscribed(&self, _channel: &str, _reply: &Message) {}

    /// Called when the server confirms an unsubscription.
    fn unsubscribed(&self, _channel: &str, _reply: &Message) {}
}
