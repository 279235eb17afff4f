//! Public client handle and builder.

use std::sync::Arc;

use cometd_core::{ConnectionState, MetaNotification};
use cometd_extensions::{Extension, ExtensionPipeline};
use cometd_settings::CometdSettings;
use cometd_transport::{HttpConfig, HttpMechanism, RequestMechanism, TransportRegistry};
use serde_json::{Map, Value};
use tokio::sync::{broadcast, mpsc, oneshot, watch};

use crate::ack::AckHandle;
use crate::driver::{Command, SessionDriver};
use crate::errors::ClientError;
use crate::listeners::Listener;
use crate::session::{Session, SessionConfig, SessionSnapshot};

/// Handle to a running session. Cheap to clone; the session stops when the
/// last handle is dropped.
#[derive(Clone, Debug)]
pub struct Client {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    notifications: broadcast::Sender<MetaNotification>,
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    fn send(&self, command: Command) -> Result<(), ClientError> {
        self.commands.send(command).map_err(|_| ClientError::Closed)
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T, ClientError> {
        let (tx, rx) = oneshot::channel();
        self.send(command(tx))?;
        rx.await.map_err(|_| ClientError::Closed)
    }

    /// Handshake with `url` (or the configured URL), passing `props` as
    /// extra handshake fields. `Ok(false)` means no URL was available.
    pub async fn init(&self, url: Option<&str>, props: Option<Map<String, Value>>) -> Result<bool, ClientError> {
        let url = url.map(str::to_owned);
        self.request(|reply| Command::Init { url, props, reply }).await
    }

    /// Publish `data` on `channel`. Queued until connected or while a batch
    /// is open.
    pub fn publish(&self, channel: &str, data: Value, props: Option<Map<String, Value>>) -> Result<(), ClientError> {
        self.send(Command::Publish {
            channel: channel.to_string(),
            data,
            props,
        })
    }

    /// Register `listener` on `channel` or a wildcard pattern.
    ///
    /// The returned handle resolves when the server confirms the
    /// subscription. `None` when `listener` was already registered there.
    pub async fn subscribe(&self, channel: &str, listener: Listener) -> Result<Option<AckHandle>, ClientError> {
        let channel = channel.to_string();
        self.request(|reply| Command::Subscribe {
            channel,
            listener,
            reply,
        })
        .await
    }

    /// Remove `listener`, or every listener when `None`.
    pub async fn unsubscribe(&self, channel: &str, listener: Option<Listener>) -> Result<Option<AckHandle>, ClientError> {
        let channel = channel.to_string();
        self.request(|reply| Command::Unsubscribe {
            channel,
            listener,
            reply,
        })
        .await
    }

    pub fn start_batch(&self) -> Result<(), ClientError> {
        self.send(Command::StartBatch)
    }

    pub fn end_batch(&self) -> Result<(), ClientError> {
        self.send(Command::EndBatch)
    }

    pub fn disconnect(&self) -> Result<(), ClientError> {
        self.send(Command::Disconnect)
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Wait until the session reaches `target`.
    pub async fn wait_for_state(&self, target: ConnectionState) -> Result<(), ClientError> {
        let mut state = self.state.clone();
        let _ = state
            .wait_for(|s| *s == target)
            .await
            .map_err(|_| ClientError::Closed)?;
        Ok(())
    }

    /// Subscribe to lifecycle notifications from now on.
    pub fn notifications(&self) -> broadcast::Receiver<MetaNotification> {
        self.notifications.subscribe()
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, ClientError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }
}

/// Assembles a session from settings, extensions, transports and a request
/// mechanism.
#[derive(Default)]
pub struct ClientBuilder {
    settings: CometdSettings,
    pipeline: ExtensionPipeline,
    registry: Option<TransportRegistry>,
    mechanism: Option<Arc<dyn RequestMechanism>>,
}

impl ClientBuilder {
    #[must_use]
    pub fn settings(mut self, settings: CometdSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Append an extension. Extensions run in registration order.
    #[must_use]
    pub fn extension(mut self, extension: Arc<dyn Extension>) -> Self {
        self.pipeline.register(extension);
        self
    }

    /// Replace the default long-polling / callback-polling candidates.
    #[must_use]
    pub fn transports(mut self, registry: TransportRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Use `mechanism` instead of an HTTP client built from the request
    /// settings.
    #[must_use]
    pub fn mechanism(mut self, mechanism: Arc<dyn RequestMechanism>) -> Self {
        self.mechanism = Some(mechanism);
        self
    }

    /// Build a handle and the driver that must be run for it to do anything.
    pub fn build(self) -> Result<(Client, SessionDriver), ClientError> {
        let mechanism = match self.mechanism {
            Some(mechanism) => mechanism,
            None => Arc::new(HttpMechanism::new(HttpConfig::from(&self.settings.request))?),
        };
        let registry = self.registry.unwrap_or_else(TransportRegistry::with_defaults);
        let session = Session::new(SessionConfig::from(&self.settings), self.pipeline, registry);
        let notifications = session.notification_sender();

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(session.state());
        let driver = SessionDriver::new(session, mechanism, commands_rx, state_tx);
        let client = Client {
            commands: commands_tx,
            state: state_rx,
            notifications,
        };
        Ok((client, driver))
    }

    /// Build and spawn the driver on the current tokio runtime.
    pub fn spawn(self) -> Result<Client, ClientError> {
        let (client, driver) = self.build()?;
        let _ = tokio::spawn(driver.run());
        Ok(client)
    }
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("settings", &self.settings)
            .field("extensions", &self.pipeline.names())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use cometd_core::{Message, MetaAction, RequestError};
    use cometd_transport::testing::{ScriptedMechanism, ScriptedReply};
    use parking_lot::Mutex;
    use serde_json::json;

    const URL: &str = "http://localhost:8080/cometd";

    fn reply(value: Value) -> ScriptedReply {
        ScriptedReply::Now(Ok(vec![serde_json::from_value(value).unwrap()]))
    }

    /// A server that accepts everything and holds every connect after the
    /// first.
    fn server() -> Arc<ScriptedMechanism> {
        let connects = Arc::new(Mutex::new(0u32));
        Arc::new(ScriptedMechanism::new(move |request| {
            let first = &request.messages[0];
            match first.channel_name() {
                "/meta/handshake" => reply(json!({
                    "channel": "/meta/handshake",
                    "successful": true,
                    "clientId": "abc",
                    "version": "1.0",
                    "supportedConnectionTypes": ["long-polling"],
                    "advice": {"reconnect": "retry", "interval": 0}
                })),
                "/meta/connect" => {
                    let mut seen = connects.lock();
                    *seen += 1;
                    if *seen == 1 {
                        reply(json!({"channel": "/meta/connect", "successful": true}))
                    } else {
                        ScriptedReply::Never
                    }
                }
                "/meta/subscribe" => reply(json!({
                    "channel": "/meta/subscribe",
                    "successful": true,
                    "subscription": first.subscription
                })),
                _ => ScriptedReply::Now(Ok(Vec::new())),
            }
        }))
    }

    fn client(mechanism: Arc<ScriptedMechanism>) -> Client {
        let settings = CometdSettings {
            server: cometd_settings::ServerSettings {
                url: Some(URL.into()),
                ..Default::default()
            },
            ..Default::default()
        };
        Client::builder()
            .settings(settings)
            .mechanism(mechanism)
            .spawn()
            .unwrap()
    }

    #[tokio::test]
    async fn init_connects_and_subscribes() {
        let mechanism = server();
        let client = client(Arc::clone(&mechanism));
        let mut notes = client.notifications();

        assert!(client.init(None, None).await.unwrap());
        assert_ne!(client.state(), ConnectionState::Disconnected);
        tokio::time::timeout(Duration::from_secs(5), client.wait_for_state(ConnectionState::Connected))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(notes.recv().await.unwrap().action, MetaAction::Handshake);

        let ack = client
            .subscribe("/chat/demo", Listener::new(|_| {}))
            .await
            .unwrap()
            .unwrap();
        tokio::time::timeout(Duration::from_secs(5), ack)
            .await
            .unwrap()
            .unwrap();

        let snapshot = client.snapshot().await.unwrap();
        assert_eq!(snapshot.client_id.as_deref(), Some("abc"));
        assert_eq!(snapshot.connection_type, Some("long-polling"));
        assert_eq!(snapshot.subscriptions, ["/chat/demo"]);
        assert!(snapshot.polling);
        assert_eq!(mechanism.sent_on("/meta/subscribe")[0].client_id.as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn init_without_url_reports_false() {
        let client = Client::builder().mechanism(server()).spawn().unwrap();
        assert!(!client.init(None, None).await.unwrap());
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn disconnect_while_polling_sends_meta_disconnect() {
        let mechanism = server();
        let client = client(Arc::clone(&mechanism));
        assert!(client.init(None, None).await.unwrap());
        client.wait_for_state(ConnectionState::Connected).await.unwrap();

        client.disconnect().unwrap();
        client.wait_for_state(ConnectionState::Disconnecting).await.unwrap();
        let snapshot = client.snapshot().await.unwrap();
        assert!(snapshot.subscriptions.is_empty());
        assert_eq!(mechanism.sent_on("/meta/disconnect").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_server_is_retried_with_backoff() {
        let mechanism = Arc::new(ScriptedMechanism::new(|_| {
            ScriptedReply::Now(Err(RequestError::Network("refused".into())))
        }));
        let client = client(Arc::clone(&mechanism));
        assert!(client.init(None, None).await.unwrap());

        tokio::time::sleep(Duration::from_millis(3500)).await;
        // Attempts at 0, 1000 and 3000 ms.
        assert_eq!(mechanism.sent_on("/meta/handshake").len(), 3);
        assert_eq!(client.state(), ConnectionState::Connecting);
    }

    #[tokio::test]
    async fn dropped_driver_closes_handles() {
        let (client, driver) = Client::builder().mechanism(server()).build().unwrap();
        drop(driver);
        assert!(matches!(client.publish("/a", json!(1), None), Err(ClientError::Closed)));
        assert!(matches!(client.snapshot().await, Err(ClientError::Closed)));
    }

    #[tokio::test]
    async fn delivered_messages_reach_listeners() {
        let mechanism = Arc::new(ScriptedMechanism::new(|request| {
            let first: &Message = &request.messages[0];
            match first.channel_name() {
                "/meta/handshake" => reply(json!({
                    "channel": "/meta/handshake",
                    "successful": true,
                    "clientId": "abc",
                    "supportedConnectionTypes": ["long-polling"]
                })),
                "/chat/demo" => ScriptedReply::Now(Ok(vec![
                    serde_json::from_value(json!({"channel": "/chat/demo", "successful": true})).unwrap(),
                    serde_json::from_value(json!({"channel": "/chat/demo", "data": first.data})).unwrap(),
                ])),
                "/meta/connect" if request.messages.len() == 1 && first.id.as_deref() == Some("2") => {
                    reply(json!({"channel": "/meta/connect", "successful": true}))
                }
                "/meta/connect" => ScriptedReply::Never,
                _ => ScriptedReply::Now(Ok(Vec::new())),
            }
        }));
        let client = client(mechanism);
        let (tx, mut rx) = mpsc::unbounded_channel();
        assert!(client.init(None, None).await.unwrap());
        client.wait_for_state(ConnectionState::Connected).await.unwrap();
        let _ = client
            .subscribe("/chat/demo", Listener::new(move |m| {
                let _ = tx.send(m.data.clone());
            }))
            .await
            .unwrap();
        client.publish("/chat/demo", json!({"text": "echo"}), None).unwrap();

        let data = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
        assert_eq!(data, Some(Some(json!({"text": "echo"}))));
    }
}
