//! # cometd-transport
//!
//! How Bayeux messages reach the server.
//!
//! - [`RequestMechanism`]: sends one batch of messages and yields the reply
//!   batch; [`HttpMechanism`] is the reqwest implementation
//! - [`codec`]: JSON array encoding, comment-guard stripping and callback
//!   unwrapping
//! - [`Transport`]: protocol behaviour shared by every connection type,
//!   driven through a [`TransportContext`] supplied by the session
//! - [`LongPolling`] / [`CallbackPolling`]: the two connection types
//! - [`TransportRegistry`]: ordered (predicate, factory) pairs; the first
//!   entry accepting the server's offer wins
//! - [`testing`]: a scripted request mechanism for tests

#![deny(unsafe_code)]

pub mod codec;
pub mod http;
pub mod mechanism;
pub mod registry;
pub mod testing;
pub mod transport;

pub use http::{HttpConfig, HttpMechanism};
pub use mechanism::{Request, RequestMechanism, RequestMode, RequestPurpose};
pub use registry::{Negotiation, TransportEntry, TransportRegistry};
pub use transport::{CallbackPolling, LongPolling, Transport, TransportContext};
