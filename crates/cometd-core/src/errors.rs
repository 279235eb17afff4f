use std::time::Duration;

/// Failure of a single request to the Bayeux server.
///
/// Every variant is handled the same way by the session (an unsuccessful
/// reply followed by advice-driven backoff); the variants exist for logging
/// and so timeouts stay distinguishable from other failures.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed reply: {0}")]
    Decode(String),
    #[error("failed to encode request: {0}")]
    Encode(String),
}

impl RequestError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::Network(_) => "network_error",
            Self::Status { .. } => "status_error",
            Self::Decode(_) => "decode_error",
            Self::Encode(_) => "encode_error",
        }
    }
}

/// Outcome of a rejected or abandoned subscribe/unsubscribe acknowledgement.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AckError {
    /// The server answered with `successful: false`.
    #[error("rejected by server: {0}")]
    Rejected(String),
    /// The acknowledgement was superseded or the session disconnected.
    #[error("acknowledgement cancelled")]
    Cancelled,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
