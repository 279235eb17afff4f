//! Request mechanism seam.

use async_trait::async_trait;
use cometd_core::{Message, RequestError};

/// How a request reaches the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestMode {
    /// Form POST; the reply may be wrapped in a `/* */` comment guard.
    SameDomain,
    /// GET with the batch in the query string; the reply is a callback
    /// invocation.
    CrossDomain,
}

/// Why the session issued a request. Decides how the reply is routed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestPurpose {
    Handshake,
    /// The long-lived `/meta/connect`.
    Tunnel,
    /// Application and subscription messages.
    Publish,
    /// `/meta/disconnect`; the reply is ignored.
    Disconnect,
}

impl std::fmt::Display for RequestPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Handshake => write!(f, "handshake"),
            Self::Tunnel => write!(f, "tunnel"),
            Self::Publish => write!(f, "publish"),
            Self::Disconnect => write!(f, "disconnect"),
        }
    }
}

/// One batch bound for the server.
#[derive(Clone, Debug, PartialEq)]
pub struct Request {
    pub url: String,
    pub messages: Vec<Message>,
    pub mode: RequestMode,
}

/// Sends request batches. Implementations must be cheap to share; the
/// session driver calls [`send`](RequestMechanism::send) from spawned tasks.
#[async_trait]
pub trait RequestMechanism: Send + Sync {
    /// Deliver `request` and return the reply batch.
    async fn send(&self, request: Request) -> Result<Vec<Message>, RequestError>;
}
