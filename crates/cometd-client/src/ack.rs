//! Subscribe and unsubscribe acknowledgements.
//!
//! Each channel has at most one pending acknowledgement per direction.
//! Starting a new one cancels the previous. Handles are cheap to clone and
//! every clone observes the same outcome.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use cometd_core::AckError;
use futures::FutureExt;
use futures::future::Shared;
use tokio::sync::oneshot;

/// Outcome of an acknowledgement.
pub type AckResult = Result<(), AckError>;

/// Resolves once the server confirms or rejects the request.
#[derive(Clone)]
pub struct AckHandle {
    inner: Shared<oneshot::Receiver<AckResult>>,
}

impl AckHandle {
    /// The outcome if already settled.
    pub fn try_result(&self) -> Option<AckResult> {
        self.clone().now_or_never()
    }
}

impl std::fmt::Debug for AckHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AckHandle")
            .field("settled", &self.try_result())
            .finish()
    }
}

impl Future for AckHandle {
    type Output = AckResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner
            .poll_unpin(cx)
            .map(|settled| settled.unwrap_or(Err(AckError::Cancelled)))
    }
}

#[derive(Debug)]
struct PendingAck {
    sender: Option<oneshot::Sender<AckResult>>,
    handle: AckHandle,
}

impl PendingAck {
    fn new() -> Self {
        let (sender, receiver) = oneshot::channel();
        Self {
            sender: Some(sender),
            handle: AckHandle {
                inner: receiver.shared(),
            },
        }
    }

    fn settle(&mut self, result: AckResult) -> bool {
        match self.sender.take() {
            Some(sender) => {
                let _ = sender.send(result);
                true
            }
            None => false,
        }
    }
}

/// Acknowledgements keyed by channel, for one direction.
#[derive(Debug, Default)]
pub struct AckRegistry {
    pending: HashMap<String, PendingAck>,
}

impl AckRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new acknowledgement for `channel`, cancelling any earlier one.
    pub fn begin(&mut self, channel: &str) -> AckHandle {
        let pending = PendingAck::new();
        let handle = pending.handle.clone();
        if let Some(mut previous) = self.pending.insert(channel.to_string(), pending) {
            let _ = previous.settle(Err(AckError::Cancelled));
        }
        handle
    }

    /// The latest handle for `channel`, settled or not.
    pub fn current(&self, channel: &str) -> Option<AckHandle> {
        self.pending.get(channel).map(|p| p.handle.clone())
    }

    /// Settle successfully. Returns `false` when nothing was pending.
    pub fn resolve(&mut self, channel: &str) -> bool {
        self.pending
            .get_mut(channel)
            .is_some_and(|p| p.settle(Ok(())))
    }

    /// Settle with the server's error. Returns `false` when nothing was
    /// pending.
    pub fn reject(&mut self, channel: &str, error: impl Into<String>) -> bool {
        self.pending
            .get_mut(channel)
            .is_some_and(|p| p.settle(Err(AckError::Rejected(error.into()))))
    }

    /// Drop the entry for `channel`, cancelling it if still pending.
    pub fn cancel(&mut self, channel: &str) {
        if let Some(mut pending) = self.pending.remove(channel) {
            let _ = pending.settle(Err(AckError::Cancelled));
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, mut pending) in self.pending.drain() {
            let _ = pending.settle(Err(AckError::Cancelled));
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn resolve_settles_every_clone() {
        let mut acks = AckRegistry::new();
        let handle = acks.begin("/chat");
        let copy = acks.current("/chat").unwrap();
        assert!(handle.try_result().is_none());
        assert!(acks.resolve("/chat"));
        assert_eq!(handle.try_result(), Some(Ok(())));
        assert_eq!(copy.try_result(), Some(Ok(())));
    }

    #[test]
    fn second_settlement_is_ignored() {
        let mut acks = AckRegistry::new();
        let handle = acks.begin("/chat");
        assert!(acks.reject("/chat", "403::denied"));
        assert!(!acks.resolve("/chat"));
        assert_matches!(handle.try_result(), Some(Err(AckError::Rejected(e))) if e == "403::denied");
    }

    #[test]
    fn begin_cancels_previous() {
        let mut acks = AckRegistry::new();
        let first = acks.begin("/chat");
        let second = acks.begin("/chat");
        assert_eq!(first.try_result(), Some(Err(AckError::Cancelled)));
        assert!(second.try_result().is_none());
    }

    #[test]
    fn cancel_all_settles_and_clears() {
        let mut acks = AckRegistry::new();
        let a = acks.begin("/a");
        let b = acks.begin("/b");
        acks.cancel_all();
        assert!(acks.is_empty());
        assert_eq!(a.try_result(), Some(Err(AckError::Cancelled)));
        assert_eq!(b.try_result(), Some(Err(AckError::Cancelled)));
    }

    #[test]
    fn unknown_channel_is_not_settled() {
        let mut acks = AckRegistry::new();
        assert!(!acks.resolve("/nothing"));
        assert!(!acks.reject("/nothing", "x"));
        assert!(acks.current("/nothing").is_none());
    }

    #[tokio::test]
    async fn handle_is_awaitable() {
        let mut acks = AckRegistry::new();
        let handle = acks.begin("/chat");
        let waiter = tokio::spawn(handle);
        assert!(acks.resolve("/chat"));
        assert_eq!(waiter.await.unwrap(), Ok(()));
    }
}
