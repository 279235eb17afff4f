//! A scripted [`RequestMechanism`] for tests.
//!
//! The responder closure sees each request and decides the reply. Every
//! request is recorded for later assertions.

use std::time::Duration;

use async_trait::async_trait;
use cometd_core::{Message, RequestError};
use parking_lot::Mutex;

use crate::mechanism::{Request, RequestMechanism};

/// What a [`ScriptedMechanism`] does with one request.
#[derive(Clone, Debug)]
pub enum ScriptedReply {
    /// Answer immediately.
    Now(Result<Vec<Message>, RequestError>),
    /// Answer after a delay (use with paused tokio time).
    After(Duration, Result<Vec<Message>, RequestError>),
    /// Never answer, like a long poll the server is holding.
    Never,
}

type Responder = Box<dyn Fn(&Request) -> ScriptedReply + Send + Sync>;

pub struct ScriptedMechanism {
    responder: Responder,
    requests: Mutex<Vec<Request>>,
}

impl ScriptedMechanism {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&Request) -> ScriptedReply + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every request seen so far.
    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().clone()
    }

    /// Every message sent so far, flattened across requests.
    pub fn sent_messages(&self) -> Vec<Message> {
        self.requests
            .lock()
            .iter()
            .flat_map(|r| r.messages.iter().cloned())
            .collect()
    }

    /// Messages sent on `channel`.
    pub fn sent_on(&self, channel: &str) -> Vec<Message> {
        self.sent_messages()
            .into_iter()
            .filter(|m| m.is_on(channel))
            .collect()
    }
}

impl std::fmt::Debug for ScriptedMechanism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedMechanism")
            .field("requests", &self.requests.lock().len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RequestMechanism for ScriptedMechanism {
    async fn send(&self, request: Request) -> Result<Vec<Message>, RequestError> {
        let reply = (self.responder)(&request);
        self.requests.lock().push(request);
        match reply {
            ScriptedReply::Now(result) => result,
            ScriptedReply::After(delay, result) => {
                tokio::time::sleep(delay).await;
                result
            }
            ScriptedReply::Never => std::future::pending().await,
        }
    }
}
