//! # cometd-client
//!
//! A Bayeux client session.
//!
//! - [`Session`]: the protocol state machine (handshake, connect loop,
//!   advice and backoff, batching, subscriptions, dispatch). Performs no
//!   I/O; it records [`Effect`]s instead
//! - [`SessionDriver`]: owns a session on a tokio task and executes its
//!   effects through a [`RequestMechanism`](cometd_transport::RequestMechanism)
//! - [`Client`]: cloneable handle that sends commands to the driver
//! - [`Listener`] / [`AckHandle`]: local subscription callbacks and
//!   subscribe/unsubscribe acknowledgements
//!
//! ```ignore
//! let client = Client::builder().settings(settings).spawn()?;
//! client.init(Some("http://localhost:8080/cometd"), None).await?;
//! client.subscribe("/chat/demo", Listener::new(|m| println!("{:?}", m.data))).await?;
//! client.publish("/chat/demo", json!({"text": "hi"}), None)?;
//! ```

#![deny(unsafe_code)]

pub mod ack;
pub mod backoff;
pub mod client;
pub mod driver;
pub mod errors;
pub mod listeners;
pub mod session;

pub use ack::{AckHandle, AckRegistry, AckResult};
pub use backoff::BackoffPolicy;
pub use client::{Client, ClientBuilder};
pub use driver::SessionDriver;
pub use errors::ClientError;
pub use listeners::{Listener, ListenerRegistry};
pub use session::{Effect, RequestId, Session, SessionConfig, SessionSnapshot, TimerId, TimerKind};
