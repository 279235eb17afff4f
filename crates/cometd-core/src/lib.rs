//! # cometd-core
//!
//! Shared types for the Bayeux (cometd) client.
//!
//! - [`Message`]: a Bayeux message with typed protocol fields and preserved
//!   extra properties
//! - [`Advice`] / [`Reconnect`]: server reconnection policy
//! - [`channel`]: meta-channel names and wildcard pattern matching
//! - [`protocol`]: protocol version constants and version comparison
//! - [`ConnectionState`]: the four client states derived from session flags
//! - [`MetaNotification`]: local lifecycle notifications
//! - [`Clock`]: wall-clock abstraction used by time-sensitive extensions
//! - [`errors`]: request and acknowledgement error types

#![deny(unsafe_code)]

pub mod advice;
pub mod channel;
pub mod clock;
pub mod errors;
pub mod message;
pub mod notification;
pub mod protocol;
pub mod state;

pub use advice::{Advice, Reconnect};
pub use clock::{Clock, ManualClock, SystemClock};
pub use errors::{AckError, RequestError};
pub use message::Message;
pub use notification::{MetaAction, MetaNotification};
pub use state::ConnectionState;
