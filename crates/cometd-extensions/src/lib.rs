//! # cometd-extensions
//!
//! Pluggable message transforms applied to every message the client sends
//! or receives.
//!
//! - [`Extension`]: one extension, with outgoing/incoming transforms and
//!   subscription hooks
//! - [`ExtensionPipeline`]: the ordered chain; failing extensions are skipped
//! - [`TimestampExtension`]: stamps outgoing messages with the send time
//! - [`SessionExtension`]: carries a server-issued session token into the
//!   handshake
//! - [`TimeSyncExtension`]: estimates the server clock offset

#![deny(unsafe_code)]

pub mod extension;
pub mod pipeline;
pub mod session;
pub mod timestamp;
pub mod timesync;

pub use extension::{Extension, ExtensionError, Transform};
pub use pipeline::ExtensionPipeline;
pub use session::SessionExtension;
pub use timestamp::TimestampExtension;
pub use timesync::TimeSyncExtension;
