//! # cometd-settings
//!
//! Client configuration with layered sources.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`CometdSettings::default()`]
//! 2. **User file**: `~/.cometd/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `COMETD_*` overrides (highest priority)
//!
//! The loaded value is validated before it is returned, so consumers can
//! rely on `backoff.maxIntervalMs >= backoff.stepMs` and a non-zero
//! time-sync window.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
