//! Connection types.
//!
//! A [`Transport`] owns no session state. Each call receives the session as
//! a [`TransportContext`] and uses it to read the client id, number and
//! extend messages, and submit requests. The protocol steps are provided
//! methods shared by every connection type; a connection type only decides
//! its name and how its requests travel.

use cometd_core::Message;
use cometd_core::channel::{META_CONNECT, META_DISCONNECT};
use tracing::debug;

use crate::mechanism::{RequestMode, RequestPurpose};

/// The session as seen by a transport.
pub trait TransportContext {
    /// Client id from the last successful handshake.
    fn client_id(&self) -> Option<&str>;

    /// Whether a `/meta/connect` has succeeded since the handshake.
    fn is_connected(&self) -> bool;

    /// A fresh message id.
    fn next_message_id(&mut self) -> String;

    /// Run the outgoing extension chain.
    fn extend_outgoing(&mut self, message: Message) -> Message;

    /// Hand a batch to the request mechanism.
    fn submit(&mut self, purpose: RequestPurpose, messages: Vec<Message>, mode: RequestMode);
}

/// A negotiated connection type.
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Name used in `supportedConnectionTypes` and `connectionType`.
    fn connection_type(&self) -> &'static str;

    /// How every request of this transport travels.
    fn request_mode(&self) -> RequestMode;

    /// Called once after a successful handshake.
    fn startup(&self, cx: &mut dyn TransportContext) {
        if cx.is_connected() {
            return;
        }
        self.tunnel_init(cx);
    }

    /// Open the long-lived `/meta/connect`.
    fn tunnel_init(&self, cx: &mut dyn TransportContext) {
        let mut message = Message::on(META_CONNECT);
        message.client_id = cx.client_id().map(str::to_owned);
        message.connection_type = Some(self.connection_type().to_string());
        message.id = Some(cx.next_message_id());
        let message = cx.extend_outgoing(message);
        debug!(connection_type = self.connection_type(), "opening tunnel");
        cx.submit(RequestPurpose::Tunnel, vec![message], self.request_mode());
    }

    /// Send a batch of application or subscription messages as one request.
    fn send_messages(&self, cx: &mut dyn TransportContext, messages: Vec<Message>) {
        let client_id = cx.client_id().map(str::to_owned);
        let mut batch = Vec::with_capacity(messages.len());
        for mut message in messages {
            message.client_id.clone_from(&client_id);
            message.id = Some(cx.next_message_id());
            batch.push(cx.extend_outgoing(message));
        }
        cx.submit(RequestPurpose::Publish, batch, self.request_mode());
    }

    /// Tell the server the client is leaving. The reply is not awaited.
    fn disconnect(&self, cx: &mut dyn TransportContext) {
        let mut message = Message::on(META_DISCONNECT);
        message.client_id = cx.client_id().map(str::to_owned);
        message.id = Some(cx.next_message_id());
        let message = cx.extend_outgoing(message);
        cx.submit(RequestPurpose::Disconnect, vec![message], self.request_mode());
    }

    /// Observe every inbound message before local dispatch.
    fn deliver(&self, _message: &Message) {}
}

/// Same-domain long-polling.
#[derive(Clone, Copy, Debug, Default)]
pub struct LongPolling;

impl LongPolling {
    pub const CONNECTION_TYPE: &'static str = "long-polling";
}

impl Transport for LongPolling {
    fn connection_type(&self) -> &'static str {
        Self::CONNECTION_TYPE
    }

    fn request_mode(&self) -> RequestMode {
        RequestMode::SameDomain
    }
}

/// Cross-domain polling with callback-wrapped replies.
#[derive(Clone, Copy, Debug, Default)]
pub struct CallbackPolling;

impl CallbackPolling {
    pub const CONNECTION_TYPE: &'static str = "callback-polling";
}

impl Transport for CallbackPolling {
    fn connection_type(&self) -> &'static str {
        Self::CONNECTION_TYPE
    }

    fn request_mode(&self) -> RequestMode {
        RequestMode::CrossDomain
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
