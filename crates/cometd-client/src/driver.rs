//! The task that owns a [`Session`] and executes its effects.
//!
//! Commands from [`Client`](crate::Client) handles and completions from
//! spawned request/timer tasks are serialized through one loop, so the
//! session is never touched concurrently.

use std::sync::Arc;

use cometd_core::{ConnectionState, Message, RequestError};
use cometd_transport::{RequestMechanism, RequestPurpose};
use serde_json::{Map, Value};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info};

use crate::ack::AckHandle;
use crate::listeners::Listener;
use crate::session::{Effect, RequestId, Session, SessionSnapshot, TimerId, TimerKind};

/// Requests from client handles.
pub(crate) enum Command {
    Init {
        url: Option<String>,
        props: Option<Map<String, Value>>,
        reply: oneshot::Sender<bool>,
    },
    Publish {
        channel: String,
        data: Value,
        props: Option<Map<String, Value>>,
    },
    Subscribe {
        channel: String,
        listener: Listener,
        reply: oneshot::Sender<Option<AckHandle>>,
    },
    Unsubscribe {
        channel: String,
        listener: Option<Listener>,
        reply: oneshot::Sender<Option<AckHandle>>,
    },
    StartBatch,
    EndBatch,
    Disconnect,
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
}

/// Completions from spawned tasks.
enum Event {
    Reply {
        id: RequestId,
        purpose: RequestPurpose,
        result: Result<Vec<Message>, RequestError>,
    },
    Timer {
        id: TimerId,
        kind: TimerKind,
    },
}

/// Runs a session until every [`Client`](crate::Client) handle is dropped.
pub struct SessionDriver {
    session: Session,
    mechanism: Arc<dyn RequestMechanism>,
    commands: mpsc::UnboundedReceiver<Command>,
    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: mpsc::UnboundedReceiver<Event>,
    state: watch::Sender<ConnectionState>,
}

impl SessionDriver {
    pub(crate) fn new(
        session: Session,
        mechanism: Arc<dyn RequestMechanism>,
        commands: mpsc::UnboundedReceiver<Command>,
        state: watch::Sender<ConnectionState>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            session,
            mechanism,
            commands,
            events_tx,
            events_rx,
            state,
        }
    }

    /// Process commands and completions until all handles are gone, then
    /// send a best-effort disconnect.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(event) = self.events_rx.recv() => self.handle_event(event),
            }
            self.execute_effects();
            self.publish_state();
        }

        info!("all client handles dropped, stopping session");
        if self.session.state() != ConnectionState::Disconnected {
            self.session.disconnect();
            self.execute_effects();
        }
        self.publish_state();
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Init { url, props, reply } => {
                let started = self.session.init(url.as_deref(), props);
                self.settle(reply, started);
            }
            Command::Publish { channel, data, props } => {
                self.session.publish(&channel, data, props);
            }
            Command::Subscribe { channel, listener, reply } => {
                let ack = self.session.subscribe(&channel, listener);
                self.settle(reply, ack);
            }
            Command::Unsubscribe { channel, listener, reply } => {
                let ack = self.session.unsubscribe(&channel, listener.as_ref());
                self.settle(reply, ack);
            }
            Command::StartBatch => self.session.start_batch(),
            Command::EndBatch => self.session.end_batch(),
            Command::Disconnect => self.session.disconnect(),
            Command::Snapshot { reply } => {
                let _ = reply.send(self.session.snapshot());
            }
        }
    }

    /// Reply to a caller once the state watch reflects the command.
    fn settle<T>(&mut self, reply: oneshot::Sender<T>, value: T) {
        self.execute_effects();
        self.publish_state();
        let _ = reply.send(value);
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Reply { id, purpose, result } => self.session.handle_reply(id, purpose, result),
            Event::Timer { id, kind } => self.session.handle_timer(id, kind),
        }
    }

    fn execute_effects(&mut self) {
        for effect in self.session.take_effects() {
            match effect {
                Effect::Submit { id, purpose, request } => {
                    debug!(%id, %purpose, messages = request.messages.len(), "submitting");
                    let mechanism = Arc::clone(&self.mechanism);
                    let events = self.events_tx.clone();
                    let _ = tokio::spawn(async move {
                        let result = mechanism.send(request).await;
                        let _ = events.send(Event::Reply { id, purpose, result });
                    });
                }
                Effect::Schedule { id, kind, delay } => {
                    let events = self.events_tx.clone();
                    let _ = tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        let _ = events.send(Event::Timer { id, kind });
                    });
                }
            }
        }
    }

    fn publish_state(&self) {
        let _ = self.state.send_replace(self.session.state());
    }
}

impl std::fmt::Debug for SessionDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionDriver")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}
