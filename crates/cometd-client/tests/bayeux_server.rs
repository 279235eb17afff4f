//! End-to-end session tests against a mocked Bayeux endpoint.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use cometd_client::{Client, Listener};
use cometd_core::{ConnectionState, Message};
use cometd_settings::{CometdSettings, ServerSettings};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const WAIT: Duration = Duration::from_secs(5);

/// Messages carried by a request, from the form body or the query string.
fn messages(req: &Request) -> Vec<Message> {
    let from_body = url::form_urlencoded::parse(&req.body)
        .find(|(k, _)| k == "message")
        .map(|(_, v)| v.into_owned());
    let from_query = || {
        req.url
            .query_pairs()
            .find(|(k, _)| k == "message")
            .map(|(_, v)| v.into_owned())
    };
    from_body
        .or_else(from_query)
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or_default()
}

/// Replies for one batch: meta requests are acknowledged, publishes are
/// acknowledged and echoed back.
fn answer(batch: &[Message], connects: &AtomicUsize) -> (Vec<Value>, bool) {
    let mut replies = Vec::new();
    let mut hold = false;
    for message in batch {
        match message.channel_name() {
            "/meta/handshake" => replies.push(json!({
                "channel": "/meta/handshake",
                "successful": true,
                "clientId": "c1",
                "version": "1.0",
                "supportedConnectionTypes": ["long-polling", "callback-polling"],
                "advice": {"reconnect": "retry", "interval": 0, "timeout": 30000}
            })),
            "/meta/connect" => {
                hold = connects.fetch_add(1, Ordering::SeqCst) > 0;
                replies.push(json!({"channel": "/meta/connect", "successful": true}));
            }
            "/meta/subscribe" | "/meta/unsubscribe" => replies.push(json!({
                "channel": message.channel,
                "successful": true,
                "subscription": message.subscription
            })),
            "/meta/disconnect" => replies.push(json!({"channel": "/meta/disconnect", "successful": true})),
            channel => {
                replies.push(json!({"channel": channel, "successful": true, "id": message.id}));
                replies.push(json!({"channel": channel, "data": message.data}));
            }
        }
    }
    (replies, hold)
}

fn settings(url: String, page_origin: Option<&str>) -> CometdSettings {
    CometdSettings {
        server: ServerSettings {
            url: Some(url),
            page_origin: page_origin.map(str::to_owned),
        },
        ..CometdSettings::default()
    }
}

async fn mount_same_domain(server: &MockServer) -> Arc<AtomicUsize> {
    let connects = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&connects);
    Mock::given(method("POST"))
        .and(path("/cometd"))
        .respond_with(move |req: &Request| {
            let (replies, hold) = answer(&messages(req), &counter);
            let body = format!("/*{}*/", Value::Array(replies));
            let response = ResponseTemplate::new(200).set_body_string(body);
            if hold {
                response.set_delay(Duration::from_secs(30))
            } else {
                response
            }
        })
        .mount(server)
        .await;
    connects
}

#[tokio::test]
async fn long_polling_round_trip() {
    let server = MockServer::start().await;
    let connects = mount_same_domain(&server).await;
    let client = Client::builder()
        .settings(settings(format!("{}/cometd", server.uri()), None))
        .spawn()
        .unwrap();

    assert!(client.init(None, None).await.unwrap());
    tokio::time::timeout(WAIT, client.wait_for_state(ConnectionState::Connected))
        .await
        .unwrap()
        .unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let ack = client
        .subscribe(
            "/chat/demo",
            Listener::new(move |m: &Message| {
                let _ = tx.send(m.data.clone());
            }),
        )
        .await
        .unwrap()
        .unwrap();
    tokio::time::timeout(WAIT, ack).await.unwrap().unwrap();

    client
        .publish("/chat/demo", json!({"user": "ada", "chat": "hello"}), None)
        .unwrap();
    let echoed = tokio::time::timeout(WAIT, rx.recv()).await.unwrap();
    assert_eq!(echoed, Some(Some(json!({"user": "ada", "chat": "hello"}))));

    let snapshot = client.snapshot().await.unwrap();
    assert_eq!(snapshot.client_id.as_deref(), Some("c1"));
    assert_eq!(snapshot.connection_type, Some("long-polling"));
    assert!(connects.load(Ordering::SeqCst) >= 2);

    client.disconnect().unwrap();
    tokio::time::timeout(WAIT, client.wait_for_state(ConnectionState::Disconnecting))
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn cross_domain_uses_callback_polling() {
    let server = MockServer::start().await;
    let connects = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&connects);
    Mock::given(method("GET"))
        .and(path("/cometd"))
        .respond_with(move |req: &Request| {
            let callback = req
                .url
                .query_pairs()
                .find(|(k, _)| k == "jsonp")
                .map(|(_, v)| v.into_owned())
                .unwrap_or_default();
            let (replies, hold) = answer(&messages(req), &counter);
            let response =
                ResponseTemplate::new(200).set_body_string(format!("{callback}({})", Value::Array(replies)));
            if hold {
                response.set_delay(Duration::from_secs(30))
            } else {
                response
            }
        })
        .mount(&server)
        .await;

    let client = Client::builder()
        .settings(settings(format!("{}/cometd", server.uri()), Some("http://app.example.com")))
        .spawn()
        .unwrap();
    assert!(client.init(None, None).await.unwrap());
    tokio::time::timeout(WAIT, client.wait_for_state(ConnectionState::Connected))
        .await
        .unwrap()
        .unwrap();

    let snapshot = client.snapshot().await.unwrap();
    assert_eq!(snapshot.connection_type, Some("callback-polling"));
    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| r.method.as_str() == "GET"));
}

#[tokio::test]
async fn unreachable_server_keeps_retrying() {
    let client = Client::builder()
        .settings(settings("http://127.0.0.1:9/cometd".into(), None))
        .spawn()
        .unwrap();
    let mut notes = client.notifications();
    assert!(client.init(None, None).await.unwrap());

    let handshook = tokio::time::timeout(WAIT, async {
        loop {
            let note = notes.recv().await.unwrap();
            if note.action == cometd_core::MetaAction::Handshook {
                break note;
            }
        }
    })
    .await
    .unwrap();
    assert!(!handshook.successful);
    assert_eq!(client.state(), ConnectionState::Connecting);
    assert_eq!(
        client.snapshot().await.unwrap().advice.interval,
        Some(1000)
    );
}
