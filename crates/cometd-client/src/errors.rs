use cometd_core::RequestError;

/// Errors returned by the [`Client`](crate::Client) handle.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The session task is gone; no further commands can be processed.
    #[error("session task has stopped")]
    Closed,
    /// The default request mechanism could not be built.
    #[error("transport setup failed: {0}")]
    Transport(#[from] RequestError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(ClientError::Closed.to_string(), "session task has stopped");
        let err: ClientError = RequestError::Network("tls".into()).into();
        assert_eq!(err.to_string(), "transport setup failed: network error: tls");
    }
}
