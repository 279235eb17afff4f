//! Terminal chat over a Bayeux server.
//!
//! Joins a room channel, prints what others say and publishes each line
//! typed on stdin. `/quit` leaves the room.

#![deny(unsafe_code)]

mod room;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use cometd_client::{Client, Listener};
use cometd_core::{ConnectionState, Message, MetaAction};
use cometd_extensions::{SessionExtension, TimeSyncExtension, TimestampExtension};
use cometd_logging::{LoggingConfig, init_logging};
use cometd_settings::CometdSettings;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::room::{ChatEvent, Input};

#[derive(Debug, Parser)]
#[command(name = "cometd-chat", about = "Chat in a room on a Bayeux server")]
struct Args {
    /// Server endpoint; overrides `server.url` from settings.
    #[arg(long)]
    url: Option<String>,

    /// Room channel.
    #[arg(long, default_value = "/chat/demo")]
    room: String,

    /// Name shown to others.
    #[arg(long)]
    name: String,

    /// Settings file instead of `~/.cometd/settings.json`.
    #[arg(long)]
    settings: Option<PathBuf>,
}

fn load_settings(path: Option<&PathBuf>) -> Result<CometdSettings> {
    match path {
        Some(path) => cometd_settings::load_settings_from_path(path)
            .with_context(|| format!("failed to load settings from {}", path.display())),
        None => cometd_settings::load_settings().context("failed to load settings"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let settings = load_settings(args.settings.as_ref())?;
    init_logging(&LoggingConfig::from_settings(&settings.logging))?;

    let mut builder = Client::builder()
        .settings(settings.clone())
        .extension(Arc::new(SessionExtension::new(settings.extensions.session_channel.clone())));
    if settings.extensions.timestamp {
        builder = builder.extension(Arc::new(TimestampExtension::new()));
    }
    if settings.extensions.timesync {
        builder = builder.extension(Arc::new(TimeSyncExtension::new(settings.extensions.timesync_window)));
    }
    let client = builder.spawn()?;

    let mut notes = client.notifications();
    let _ = tokio::spawn(async move {
        while let Ok(note) = notes.recv().await {
            if !note.successful && note.action == MetaAction::Connect {
                warn!(state = %note.state, "connection problem, retrying");
            }
        }
    });

    if !client.init(args.url.as_deref(), None).await? {
        anyhow::bail!("no server url: pass --url or set server.url in settings");
    }
    client.wait_for_state(ConnectionState::Connected).await?;
    info!(room = %args.room, "connected");

    let printer = Listener::new(|message: &Message| {
        if let Some(event) = message.data.as_ref().and_then(ChatEvent::from_data) {
            println!("{}", event.render());
        }
    });
    if let Some(ack) = client.subscribe(&args.room, printer).await?
        && let Err(error) = ack.await
    {
        anyhow::bail!("could not join {}: {error}", args.room);
    }

    client.publish(&args.room, serde_json::to_value(ChatEvent::joined(&args.name))?, None)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match Input::parse(&line) {
            Input::Empty => {}
            Input::Quit => break,
            Input::Say(text) => {
                let event = ChatEvent::said(&args.name, &text);
                client.publish(&args.room, serde_json::to_value(event)?, None)?;
            }
        }
    }

    // Leave and unsubscribe in one request.
    client.start_batch()?;
    client.publish(&args.room, serde_json::to_value(ChatEvent::left(&args.name))?, None)?;
    let _ = client.unsubscribe(&args.room, None).await?;
    client.end_batch()?;
    client.disconnect()?;
    let _ = tokio::time::timeout(
        Duration::from_secs(2),
        client.wait_for_state(ConnectionState::Disconnected),
    )
    .await;
    Ok(())
}
