//! The ordered extension chain.
//!
//! Both directions run extensions in registration order. An extension that
//! returns an error or panics is logged and skipped; the message it was
//! given continues down the chain untouched.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use cometd_core::Message;
use tracing::{error, warn};

use crate::extension::{Extension, ExtensionError, Transform};

#[derive(Clone, Copy, Debug)]
enum Direction {
    Outgoing,
    Incoming,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Outgoing => write!(f, "outgoing"),
            Self::Incoming => write!(f, "incoming"),
        }
    }
}

/// Registered extensions, applied in order.
#[derive(Clone, Default)]
pub struct ExtensionPipeline {
    extensions: Vec<Arc<dyn Extension>>,
}

impl ExtensionPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an extension to the end of both chains.
    pub fn register(&mut self, extension: Arc<dyn Extension>) {
        self.extensions.push(extension);
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    /// Names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.extensions.iter().map(|e| e.name()).collect()
    }

    /// Run the outgoing chain.
    pub fn outgoing(&self, message: Message) -> Message {
        self.run(Direction::Outgoing, message)
    }

    /// Run the incoming chain.
    pub fn incoming(&self, message: Message) -> Message {
        self.run(Direction::Incoming, message)
    }

    /// Notify every extension of a confirmed subscription.
    pub fn subscribed(&self, channel: &str, reply: &Message) {
        for extension in &self.extensions {
            if catch_unwind(AssertUnwindSafe(|| extension.subscribed(channel, reply))).is_err() {
                error!(extension = extension.name(), channel, "subscribed hook panicked");
            }
        }
    }

    /// Notify every extension of a confirmed unsubscription.
    pub fn unsubscribed(&self, channel: &str, reply: &Message) {
        for extension in &self.extensions {
            if catch_unwind(AssertUnwindSafe(|| extension.unsubscribed(channel, reply))).is_err() {
                error!(extension = extension.name(), channel, "unsubscribed hook panicked");
            }
        }
    }

    fn run(&self, direction: Direction, mut message: Message) -> Message {
        for extension in &self.extensions {
            let outcome: std::thread::Result<Result<Transform, ExtensionError>> =
                catch_unwind(AssertUnwindSafe(|| match direction {
                    Direction::Outgoing => extension.outgoing(&message),
                    Direction::Incoming => extension.incoming(&message),
                }));
            match outcome {
                Ok(Ok(Transform::Replace(next))) => message = next,
                Ok(Ok(Transform::Unchanged)) => {}
                Ok(Err(e)) => {
                    warn!(
                        extension = extension.name(),
                        %direction,
                        channel = message.channel_name(),
                        error = %e,
                        "extension failed, message passed through unchanged"
                    );
                }
                Err(_panic) => {
                    error!(
                        extension = extension.name(),
                        %direction,
                        channel = message.channel_name(),
                        "extension panicked, message passed through unchanged"
                    );
                }
            }
        }
        message
    }
}

impl std::fmt::Debug for ExtensionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionPipeline")
            .field("extensions", &self.names())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
