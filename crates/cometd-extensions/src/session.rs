//! Session affinity.
//!
//! The server hands out an opaque token on a designated channel; the
//! extension remembers the latest one and presents it as `ext.session` on
//! every subsequent handshake so the server can resume the session.

use cometd_core::Message;
use cometd_core::channel::META_HANDSHAKE;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use crate::extension::{Extension, ExtensionError, Transform};

/// Default channel carrying session tokens.
pub const DEFAULT_SESSION_CHANNEL: &str = "/service/session";

const SESSION_KEY: &str = "session";

pub struct SessionExtension {
    channel: String,
    token: Mutex<Option<String>>,
}

impl SessionExtension {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            token: Mutex::new(None),
        }
    }

    /// Channel the token is read from.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// The captured token, if any.
    pub fn token(&self) -> Option<String> {
        self.token.lock().clone()
    }

    /// Seed the token, e.g. from a previous process.
    pub fn set_token(&self, token: impl Into<String>) {
        *self.token.lock() = Some(token.into());
    }

    pub fn clear(&self) {
        *self.token.lock() = None;
    }
}

impl Default for SessionExtension {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_CHANNEL)
    }
}

fn token_in(message: &Message) -> Option<&str> {
    message
        .ext_value(SESSION_KEY)
        .and_then(Value::as_str)
        .or_else(|| {
            message
                .data
                .as_ref()
                .and_then(|d| d.get(SESSION_KEY))
                .and_then(Value::as_str)
        })
}

impl Extension for SessionExtension {
    fn name(&self) -> &str {
        "session"
    }

    fn outgoing(&self, message: &Message) -> Result<Transform, ExtensionError> {
        if !message.is_on(META_HANDSHAKE) {
            return Ok(Transform::Unchanged);
        }
        let Some(token) = self.token() else {
            return Ok(Transform::Unchanged);
        };
        let mut next = message.clone();
        let _ = next
            .ext_mut()
            .insert(SESSION_KEY.to_string(), Value::String(token));
        Ok(Transform::Replace(next))
    }

    fn incoming(&self, message: &Message) -> Result<Transform, ExtensionError> {
        if !message.is_on(&self.channel) {
            return Ok(Transform::Unchanged);
        }
        match token_in(message) {
            Some(token) => {
                debug!(channel = %self.channel, "captured session token");
                self.set_token(token);
                Ok(Transform::Unchanged)
            }
            None => Err(ExtensionError::Malformed {
                field: "session",
                reason: format!("no token in message on {}", self.channel),
            }),
        }
    }
}
