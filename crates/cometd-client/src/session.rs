//! The Bayeux session state machine.
//!
//! [`Session`] performs no I/O. Operations mutate state and record
//! [`Effect`]s (requests to submit, timers to arm) which the driver drains
//! with [`Session::take_effects`] and executes. Completions come back through
//! [`Session::handle_reply`] and [`Session::handle_timer`], tagged with the
//! id the effect carried, so replies and timers from an abandoned handshake
//! or tunnel are recognised and dropped.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use cometd_core::channel::{META_CONNECT, META_HANDSHAKE, META_SUBSCRIBE, META_UNSUBSCRIBE};
use cometd_core::protocol::{self, JSON_COMMENT_FILTERED};
use cometd_core::{
    Advice, ConnectionState, Message, MetaAction, MetaNotification, Reconnect, RequestError,
};
use cometd_extensions::ExtensionPipeline;
use cometd_settings::CometdSettings;
use cometd_transport::{
    Negotiation, Request, RequestMode, RequestPurpose, Transport, TransportContext,
    TransportRegistry,
};
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use url::Url;

use crate::ack::{AckHandle, AckRegistry};
use crate::backoff::BackoffPolicy;
use crate::listeners::{Listener, ListenerRegistry};

const NOTIFICATION_CAPACITY: usize = 64;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Static session configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Used when `init` is called without a URL and none was stored.
    pub server_url: Option<String>,
    /// Origin of the embedding page; a server on another host or port is
    /// cross-domain.
    pub page_origin: Option<String>,
    /// Announced protocol version.
    pub version: String,
    /// Oldest server version accepted.
    pub minimum_version: String,
    pub backoff: BackoffPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from(&CometdSettings::default())
    }
}

impl From<&CometdSettings> for SessionConfig {
    fn from(settings: &CometdSettings) -> Self {
        Self {
            server_url: settings.server.url.clone(),
            page_origin: settings.server.page_origin.clone(),
            version: settings.protocol.version.clone(),
            minimum_version: settings.protocol.minimum_version.clone(),
            backoff: BackoffPolicy::from(&settings.backoff),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Effects
// ─────────────────────────────────────────────────────────────────────────────

/// Identifies one submitted request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// Identifies one armed timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl std::fmt::Display for TimerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

/// What a timer does when it fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerKind {
    /// Repeat a failed handshake with the stored URL and props.
    RetryHandshake,
    /// Re-open the tunnel, or re-handshake if advised.
    Reconnect,
}

/// Work the driver must perform on the session's behalf.
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    /// Send `request`; report the outcome with [`Session::handle_reply`].
    Submit {
        id: RequestId,
        purpose: RequestPurpose,
        request: Request,
    },
    /// Wait `delay`, then call [`Session::handle_timer`].
    Schedule {
        id: TimerId,
        kind: TimerKind,
        delay: Duration,
    },
}

/// Point-in-time view of the session.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionSnapshot {
    pub state: ConnectionState,
    pub client_id: Option<String>,
    pub connection_type: Option<&'static str>,
    pub advice: Advice,
    pub batch_depth: u32,
    pub queued: usize,
    pub polling: bool,
    pub subscriptions: Vec<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// One logical Bayeux client session.
pub struct Session {
    config: SessionConfig,
    pipeline: ExtensionPipeline,
    registry: TransportRegistry,
    listeners: ListenerRegistry,
    subscribe_acks: AckRegistry,
    unsubscribe_acks: AckRegistry,
    notifications: broadcast::Sender<MetaNotification>,

    initialized: bool,
    connected: bool,
    client_id: Option<String>,
    server_url: Option<String>,
    handshake_props: Option<Map<String, Value>>,
    cross_domain: bool,
    advice: Advice,
    transport: Option<Arc<dyn Transport>>,

    batch_depth: u32,
    queue: Vec<Message>,

    pending_handshake: Option<RequestId>,
    tunnel: Option<RequestId>,
    /// In-flight publish requests, with the (meta channel, subscription)
    /// pairs they carry.
    publishes: HashMap<RequestId, Vec<(String, String)>>,
    timers: HashSet<TimerId>,

    last_message: Option<Message>,
    handshake_reply: Option<Message>,

    message_counter: u64,
    request_counter: u64,
    timer_counter: u64,
    effects: Vec<Effect>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .field("client_id", &self.client_id)
            .field("server_url", &self.server_url)
            .field("transport", &self.connection_type())
            .field("batch_depth", &self.batch_depth)
            .field("queued", &self.queue.len())
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(config: SessionConfig, pipeline: ExtensionPipeline, registry: TransportRegistry) -> Self {
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Self {
            config,
            pipeline,
            registry,
            listeners: ListenerRegistry::new(),
            subscribe_acks: AckRegistry::new(),
            unsubscribe_acks: AckRegistry::new(),
            notifications,
            initialized: false,
            connected: false,
            client_id: None,
            server_url: None,
            handshake_props: None,
            cross_domain: false,
            advice: Advice::default(),
            transport: None,
            batch_depth: 0,
            queue: Vec::new(),
            pending_handshake: None,
            tunnel: None,
            publishes: HashMap::new(),
            timers: HashSet::new(),
            last_message: None,
            handshake_reply: None,
            message_counter: 0,
            request_counter: 0,
            timer_counter: 0,
            effects: Vec::new(),
        }
    }

    // ── Accessors ──────────────────────────────────────────────────────────

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_flags(self.initialized, self.connected)
    }

    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    pub fn server_url(&self) -> Option<&str> {
        self.server_url.as_deref()
    }

    /// Whether the current server is on another origin than the page.
    pub fn is_cross_domain(&self) -> bool {
        self.cross_domain
    }

    /// Negotiated connection type.
    pub fn connection_type(&self) -> Option<&'static str> {
        self.transport.as_ref().map(|t| t.connection_type())
    }

    /// Current merged advice.
    pub fn advice(&self) -> &Advice {
        &self.advice
    }

    pub fn batch_depth(&self) -> u32 {
        self.batch_depth
    }

    pub fn is_batching(&self) -> bool {
        self.batch_depth > 0
    }

    /// Messages waiting for the next flush.
    pub fn queued(&self) -> &[Message] {
        &self.queue
    }

    /// Whether a `/meta/connect` is outstanding.
    pub fn is_polling(&self) -> bool {
        self.tunnel.is_some()
    }

    /// Last inbound message processed.
    pub fn last_message(&self) -> Option<&Message> {
        self.last_message.as_ref()
    }

    /// Reply to the most recent handshake.
    pub fn handshake_reply(&self) -> Option<&Message> {
        self.handshake_reply.as_ref()
    }

    /// Channels and patterns with local listeners.
    pub fn subscriptions(&self) -> Vec<String> {
        self.listeners.channels()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state(),
            client_id: self.client_id.clone(),
            connection_type: self.connection_type(),
            advice: self.advice.clone(),
            batch_depth: self.batch_depth,
            queued: self.queue.len(),
            polling: self.is_polling(),
            subscriptions: self.subscriptions(),
        }
    }

    /// A new receiver of lifecycle notifications.
    pub fn notifications(&self) -> broadcast::Receiver<MetaNotification> {
        self.notifications.subscribe()
    }

    /// The sender behind [`Session::notifications`], for handles that
    /// subscribe later.
    pub fn notification_sender(&self) -> broadcast::Sender<MetaNotification> {
        self.notifications.clone()
    }

    /// Drain pending effects in the order they were recorded.
    pub fn take_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    // ── Handshake ──────────────────────────────────────────────────────────

    /// Start a session against `url` (or the stored / configured URL),
    /// sending a handshake carrying `props`.
    ///
    /// Clears listeners, queued messages and the client id, and opens an
    /// implicit batch that the first successful connect closes. Returns
    /// `false` without doing anything when no URL is known.
    pub fn init(&mut self, url: Option<&str>, props: Option<Map<String, Value>>) -> bool {
        let Some(url) = url
            .map(str::to_owned)
            .or_else(|| self.server_url.clone())
            .or_else(|| self.config.server_url.clone())
        else {
            warn!("no server url configured, handshake not sent");
            return false;
        };
        let cross_domain = is_cross_domain(&url, self.config.page_origin.as_deref());

        self.server_url = Some(url.clone());
        self.handshake_props.clone_from(&props);
        self.cross_domain = cross_domain;
        self.listeners.clear();
        self.subscribe_acks.cancel_all();
        self.unsubscribe_acks.cancel_all();
        self.queue.clear();
        self.client_id = None;
        self.connected = false;
        self.initialized = true;
        self.tunnel = None;
        self.publishes.clear();
        self.timers.clear();
        self.batch_depth = 0;
        self.start_batch();

        let mut message = Message::from_props(META_HANDSHAKE, props);
        message.version = Some(self.config.version.clone());
        message.minimum_version = Some(self.config.minimum_version.clone());
        message.supported_connection_types = Some(self.registry.connection_types());
        message.id = Some(self.next_message_id());
        if !cross_domain {
            let ext = message.ext_mut();
            if !matches!(ext.get(JSON_COMMENT_FILTERED), Some(Value::Bool(_))) {
                let _ = ext.insert(JSON_COMMENT_FILTERED.to_string(), Value::Bool(true));
            }
        }
        let message = self.pipeline.outgoing(message);
        let mode = if cross_domain {
            RequestMode::CrossDomain
        } else {
            RequestMode::SameDomain
        };

        info!(url = %url, cross_domain, "sending handshake");
        self.submit(RequestPurpose::Handshake, vec![message], mode);
        self.notify(MetaAction::Handshake, true);
        true
    }

    /// Repeat the handshake with the stored URL and props.
    fn rehandshake(&mut self) {
        let props = self.handshake_props.clone();
        let _ = self.init(None, props);
    }

    fn finish_init(&mut self, result: Result<Vec<Message>, RequestError>) {
        let reply = match result {
            Ok(messages) => first_on(messages, META_HANDSHAKE),
            Err(error) => {
                warn!(error = %error, kind = error.error_kind(), "handshake request failed");
                Message::default()
            }
        };
        let reply = self.pipeline.incoming(reply);
        let previous_interval = self.advice.interval_ms();
        if let Some(advice) = &reply.advice {
            self.advice.merge(advice);
        }

        let mut successful = reply.is_successful();
        if successful && reply.client_id.is_none() {
            warn!("handshake reply carries no client id");
            successful = false;
        }
        if successful
            && !protocol::version_satisfies(reply.version.as_deref(), &self.config.minimum_version)
        {
            warn!(
                server = reply.version.as_deref().unwrap_or_default(),
                minimum = %self.config.minimum_version,
                "server protocol version too old"
            );
            successful = false;
            self.advice.reconnect = Some(Reconnect::Never);
        }
        if successful && !self.select_transport(&reply) {
            successful = false;
            self.advice.reconnect = Some(Reconnect::Never);
        }

        if successful {
            self.client_id.clone_from(&reply.client_id);
            let mut advice = reply.advice.clone().unwrap_or_default();
            advice.reconnect = advice.reconnect.or(Some(Reconnect::Retry));
            advice.interval = Some(advice.interval_ms());
            self.advice = advice;
            info!(
                client_id = self.client_id.as_deref().unwrap_or_default(),
                connection_type = self.connection_type().unwrap_or_default(),
                "handshake succeeded"
            );
            self.handshake_reply = Some(reply);
            if let Some(transport) = self.transport.clone() {
                transport.startup(self);
            }
            self.notify(MetaAction::Handshook, true);
            return;
        }

        warn!(error = reply.error.as_deref().unwrap_or_default(), "handshake failed");
        self.handshake_reply = Some(reply);
        // A failed handshake never shortens the retry interval.
        self.advice.interval = Some(self.advice.interval_ms().max(previous_interval));
        self.backoff();
        if self.advice.forbids_reconnect() {
            info!("server advised against reconnecting");
            self.initialized = false;
            self.finish_disconnect();
            self.notify(MetaAction::Handshook, false);
            return;
        }
        self.notify(MetaAction::Handshook, false);
        let interval = self.advice.interval_ms();
        if interval > 0 {
            self.schedule(TimerKind::RetryHandshake, Duration::from_millis(interval));
        } else {
            self.rehandshake();
        }
    }

    /// Pick the transport for the server's offer. Keeps the current
    /// instance when the connection type is unchanged.
    fn select_transport(&mut self, reply: &Message) -> bool {
        let supported = reply.supported_connection_types.clone().unwrap_or_default();
        let negotiation = Negotiation {
            supported: &supported,
            version: reply.version.as_deref(),
            cross_domain: self.cross_domain,
        };
        let Some(entry) = self.registry.select(&negotiation) else {
            warn!(offered = ?supported, "no transport matches the server's offer");
            return false;
        };
        let current = self.transport.as_ref().map(|t| t.connection_type());
        if current != Some(entry.connection_type()) {
            debug!(from = ?current, to = entry.connection_type(), "switching transport");
            self.transport = Some(entry.create());
        }
        true
    }

    // ── Tunnel ─────────────────────────────────────────────────────────────

    fn on_tunnel_reply(&mut self, result: Result<Vec<Message>, RequestError>) {
        match result {
            Ok(messages) => self.deliver(messages),
            Err(error) => {
                warn!(error = %error, kind = error.error_kind(), "connect request failed");
                if !self.initialized {
                    self.finish_disconnect();
                }
                self.notify(MetaAction::Connect, false);
                self.backoff();
            }
        }
        self.tunnel_collapse();
    }

    /// The outstanding connect has returned: decide when to poll again.
    fn tunnel_collapse(&mut self) {
        if !self.initialized {
            return;
        }
        if self.advice.forbids_reconnect() {
            info!("server advised against reconnecting");
            return;
        }
        let interval = self.advice.interval_ms();
        if interval > 0 {
            self.schedule(TimerKind::Reconnect, Duration::from_millis(interval));
        } else {
            self.reconnect();
        }
    }

    fn reconnect(&mut self) {
        if !self.initialized {
            return;
        }
        if self.tunnel.is_some() {
            debug!("connect already outstanding");
            return;
        }
        if self.advice.reconnect == Some(Reconnect::Handshake) {
            info!("server advised a new handshake");
            self.connected = false;
            self.rehandshake();
            return;
        }
        if self.connected
            && let Some(transport) = self.transport.clone()
        {
            transport.tunnel_init(self);
        }
    }

    /// Failure handling shared by handshake and connect: grow the interval
    /// and default to retrying.
    fn backoff(&mut self) {
        let current = self.advice.interval_ms();
        self.advice.reconnect = self.advice.reconnect.or(Some(Reconnect::Retry));
        self.advice.interval = Some(self.config.backoff.next_interval(current));
        debug!(interval_ms = self.advice.interval_ms(), reconnect = ?self.advice.reconnect, "backing off");
    }

    fn finish_disconnect(&mut self) {
        self.connected = false;
        self.client_id = None;
    }

    // ── Completions ────────────────────────────────────────────────────────

    /// Feed back the outcome of a submitted request.
    pub fn handle_reply(
        &mut self,
        id: RequestId,
        purpose: RequestPurpose,
        result: Result<Vec<Message>, RequestError>,
    ) {
        match purpose {
            RequestPurpose::Handshake => {
                if self.pending_handshake != Some(id) {
                    debug!(%id, "dropping stale handshake reply");
                    return;
                }
                self.pending_handshake = None;
                self.finish_init(result);
            }
            RequestPurpose::Tunnel => {
                if self.tunnel != Some(id) {
                    debug!(%id, "dropping stale connect reply");
                    return;
                }
                self.tunnel = None;
                self.on_tunnel_reply(result);
            }
            RequestPurpose::Publish => {
                let Some(carried) = self.publishes.remove(&id) else {
                    debug!(%id, "dropping stale publish reply");
                    return;
                };
                match result {
                    Ok(messages) => self.deliver(messages),
                    Err(error) => {
                        warn!(error = %error, kind = error.error_kind(), "publish request failed");
                        let reason = format!("request failed: {error}");
                        for (meta, subscription) in carried {
                            if meta == META_SUBSCRIBE {
                                let _ = self.subscribe_acks.reject(&subscription, reason.clone());
                            } else {
                                let _ = self.unsubscribe_acks.reject(&subscription, reason.clone());
                            }
                        }
                    }
                }
            }
            RequestPurpose::Disconnect => match result {
                Ok(_) => debug!("disconnect acknowledged"),
                Err(error) => debug!(error = %error, "disconnect request failed"),
            },
        }
    }

    /// Fire an armed timer.
    pub fn handle_timer(&mut self, id: TimerId, kind: TimerKind) {
        if !self.timers.remove(&id) {
            debug!(%id, "dropping stale timer");
            return;
        }
        match kind {
            TimerKind::RetryHandshake => {
                if self.initialized {
                    self.rehandshake();
                }
            }
            TimerKind::Reconnect => self.reconnect(),
        }
    }

    // ── Inbound ────────────────────────────────────────────────────────────

    fn deliver(&mut self, messages: Vec<Message>) {
        for message in messages {
            self.deliver_one(message);
        }
    }

    fn deliver_one(&mut self, message: Message) {
        let message = self.pipeline.incoming(message);
        if message.channel.is_none() && message.success != Some(true) {
            warn!("dropping message without channel");
            return;
        }
        if let Some(advice) = &message.advice {
            self.advice.merge(advice);
        }
        let Some(channel) = message.channel.clone() else {
            self.last_message = Some(message);
            return;
        };

        match channel.as_str() {
            META_CONNECT => self.on_connect_reply(&message),
            META_SUBSCRIBE => {
                let subscription = message.subscription.clone().unwrap_or_default();
                if message.is_successful() {
                    self.pipeline.subscribed(&subscription, &message);
                    let _ = self.subscribe_acks.resolve(&subscription);
                } else {
                    let error = message.error.clone().unwrap_or_else(|| "subscribe failed".into());
                    warn!(subscription = %subscription, error = %error, "subscribe rejected");
                    let _ = self.subscribe_acks.reject(&subscription, error);
                    self.last_message = Some(message);
                    return;
                }
            }
            META_UNSUBSCRIBE => {
                let subscription = message.subscription.clone().unwrap_or_default();
                if message.is_successful() {
                    self.pipeline.unsubscribed(&subscription, &message);
                    let _ = self.unsubscribe_acks.resolve(&subscription);
                } else {
                    let error = message.error.clone().unwrap_or_else(|| "unsubscribe failed".into());
                    warn!(subscription = %subscription, error = %error, "unsubscribe rejected");
                    let _ = self.unsubscribe_acks.reject(&subscription, error);
                    self.last_message = Some(message);
                    return;
                }
            }
            _ => {}
        }

        if let Some(transport) = &self.transport {
            transport.deliver(&message);
        }
        if message.data.is_some() {
            let _ = self.listeners.dispatch(&channel, &message);
        }
        self.last_message = Some(message);
    }

    fn on_connect_reply(&mut self, message: &Message) {
        let successful = message.is_successful();
        if successful && !self.connected {
            self.connected = self.initialized;
            if self.connected {
                info!("connected");
                self.end_batch();
            }
        } else if !self.initialized {
            self.finish_disconnect();
        }
        if !successful {
            warn!(error = message.error.as_deref().unwrap_or_default(), "connect unsuccessful");
        }
        self.notify(MetaAction::Connect, successful);
    }

    // ── Outbound ───────────────────────────────────────────────────────────

    /// Transmit now when connected and not batching; queue otherwise.
    fn send_message(&mut self, message: Message) {
        if self.batch_depth == 0
            && self.connected
            && let Some(transport) = self.transport.clone()
        {
            transport.send_messages(self, vec![message]);
            return;
        }
        self.queue.push(message);
    }

    fn flush(&mut self) {
        if self.queue.is_empty() {
            return;
        }
        let Some(transport) = self.transport.clone() else {
            return;
        };
        let messages = std::mem::take(&mut self.queue);
        debug!(count = messages.len(), "flushing queued messages");
        transport.send_messages(self, messages);
    }

    /// Publish `data` on `channel`, merged over optional extra properties.
    pub fn publish(&mut self, channel: &str, data: Value, props: Option<Map<String, Value>>) {
        let message = Message::from_props(channel, props).with_data(data);
        self.send_message(message);
    }

    /// Add `listener` on `channel` (which may be a wildcard pattern).
    ///
    /// Only the first listener on a channel sends `/meta/subscribe`; later
    /// listeners share its acknowledgement. Returns `None` for a listener
    /// already registered on the channel.
    pub fn subscribe(&mut self, channel: &str, listener: Listener) -> Option<AckHandle> {
        if self.listeners.contains(channel, &listener) {
            debug!(channel, "listener already subscribed");
            return None;
        }
        if !self.listeners.has_channel(channel) {
            let _ = self.subscribe_acks.begin(channel);
            self.send_message(Message::on(META_SUBSCRIBE).with_subscription(channel));
        }
        let _ = self.listeners.add(channel, listener);
        self.subscribe_acks.current(channel)
    }

    /// Remove `listener` (or every listener) from `channel`.
    ///
    /// `/meta/unsubscribe` is sent only when the last listener goes. Returns
    /// `None` when nothing was subscribed.
    pub fn unsubscribe(&mut self, channel: &str, listener: Option<&Listener>) -> Option<AckHandle> {
        if !self.listeners.has_channel(channel) {
            return None;
        }
        if self.listeners.remove(channel, listener) == 0 {
            self.subscribe_acks.cancel(channel);
            let _ = self.unsubscribe_acks.begin(channel);
            self.send_message(Message::on(META_UNSUBSCRIBE).with_subscription(channel));
        }
        self.unsubscribe_acks.current(channel)
    }

    pub fn start_batch(&mut self) {
        self.batch_depth += 1;
    }

    /// Close one batch level. Leaving the outermost batch while connected
    /// sends everything queued as one request.
    pub fn end_batch(&mut self) {
        self.batch_depth = self.batch_depth.saturating_sub(1);
        if self.batch_depth == 0 && self.connected {
            self.flush();
        }
    }

    /// Leave the session.
    ///
    /// Listeners and queued messages are dropped and pending
    /// acknowledgements cancelled. While a connect is outstanding the state
    /// stays `Disconnecting` until it returns.
    pub fn disconnect(&mut self) {
        self.listeners.clear();
        self.queue.clear();
        self.subscribe_acks.cancel_all();
        self.unsubscribe_acks.cancel_all();
        if self.initialized
            && let Some(transport) = self.transport.clone()
        {
            transport.disconnect(self);
        }
        self.initialized = false;
        self.pending_handshake = None;
        self.publishes.clear();
        self.timers.clear();
        info!(polling = self.is_polling(), "disconnecting");
        if self.tunnel.is_none() {
            self.finish_disconnect();
            self.notify(MetaAction::Connect, false);
        }
        self.notify(MetaAction::Disconnect, true);
    }

    // ── Internals ──────────────────────────────────────────────────────────

    fn schedule(&mut self, kind: TimerKind, delay: Duration) {
        self.timer_counter += 1;
        let id = TimerId(self.timer_counter);
        let _ = self.timers.insert(id);
        debug!(%id, ?kind, delay_ms = delay.as_millis(), "timer armed");
        self.effects.push(Effect::Schedule { id, kind, delay });
    }

    fn notify(&self, action: MetaAction, successful: bool) {
        let notification = MetaNotification::new(action, successful, self.state());
        debug!(?action, successful, state = %notification.state, "meta notification");
        let _ = self.notifications.send(notification);
    }
}

impl TransportContext for Session {
    fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn next_message_id(&mut self) -> String {
        self.message_counter += 1;
        self.message_counter.to_string()
    }

    fn extend_outgoing(&mut self, message: Message) -> Message {
        self.pipeline.outgoing(message)
    }

    fn submit(&mut self, purpose: RequestPurpose, messages: Vec<Message>, mode: RequestMode) {
        let Some(url) = self.server_url.clone() else {
            warn!(%purpose, "no server url, request dropped");
            return;
        };
        self.request_counter += 1;
        let id = RequestId(self.request_counter);
        match purpose {
            RequestPurpose::Handshake => self.pending_handshake = Some(id),
            RequestPurpose::Tunnel => self.tunnel = Some(id),
            RequestPurpose::Publish => {
                let carried = messages
                    .iter()
                    .filter(|m| m.is_on(META_SUBSCRIBE) || m.is_on(META_UNSUBSCRIBE))
                    .map(|m| {
                        (
                            m.channel_name().to_string(),
                            m.subscription.clone().unwrap_or_default(),
                        )
                    })
                    .collect();
                let _ = self.publishes.insert(id, carried);
            }
            RequestPurpose::Disconnect => {}
        }
        self.effects.push(Effect::Submit {
            id,
            purpose,
            request: Request { url, messages, mode },
        });
    }
}

/// The first message on `channel`, else the first message, else an empty
/// one.
fn first_on(messages: Vec<Message>, channel: &str) -> Message {
    let index = messages.iter().position(|m| m.is_on(channel)).unwrap_or(0);
    messages.into_iter().nth(index).unwrap_or_default()
}

/// Whether `url` is on another host or port than `page_origin`. Relative or
/// unparsable URLs count as same-domain.
fn is_cross_domain(url: &str, page_origin: Option<&str>) -> bool {
    let Some(origin) = page_origin else {
        return false;
    };
    let (Ok(target), Ok(origin)) = (Url::parse(url), Url::parse(origin)) else {
        return false;
    };
    target.host_str() != origin.host_str()
        || target.port_or_known_default() != origin.port_or_known_default()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
