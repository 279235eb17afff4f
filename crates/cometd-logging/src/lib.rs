//! # cometd-logging
//!
//! Structured logging setup with `tracing`.
//!
//! The library crates only emit `tracing` events; applications call
//! [`init_logging`] once at startup to install a subscriber. `RUST_LOG`
//! takes precedence over the configured level and per-module overrides.

#![deny(unsafe_code)]

pub mod types;

pub use types::LogLevel;

use cometd_settings::LoggingSettings;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Errors from subscriber installation.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// A filter directive could not be parsed.
    #[error("invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),
    /// A global subscriber is already installed.
    #[error("logging already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Subscriber configuration.
#[derive(Clone, Debug, Default)]
pub struct LoggingConfig {
    /// Default level. Overridden by `RUST_LOG`.
    pub level: LogLevel,
    /// Per-module level overrides (e.g. `cometd_client` => `Debug`).
    pub module_levels: Vec<(String, LogLevel)>,
    /// JSON lines instead of compact human output.
    pub json: bool,
}

impl LoggingConfig {
    /// Build from the `logging` settings section.
    pub fn from_settings(settings: &LoggingSettings) -> Self {
        Self {
            level: LogLevel::from_str_lossy(&settings.level),
            module_levels: Vec::new(),
            json: settings.json,
        }
    }

    /// Builder-style per-module override.
    #[must_use]
    pub fn with_module_level(mut self, module: impl Into<String>, level: LogLevel) -> Self {
        self.module_levels.push((module.into(), level));
        self
    }

    /// Filter directives equivalent to this config, e.g.
    /// `info,cometd_client=debug`.
    pub fn directives(&self) -> String {
        let mut directives = self.level.to_string();
        for (module, level) in &self.module_levels {
            directives.push_str(&format!(",{module}={level}"));
        }
        directives
    }
}

/// Install the global subscriber, writing to stderr.
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(config.directives())?,
    };

    let result = if config.json {
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_writer(std::io::stderr)
            .with_filter(filter);
        tracing_subscriber::registry().with(layer).try_init()
    } else {
        let layer = tracing_subscriber::fmt::layer()
            .compact()
            .with_target(true)
            .with_writer(std::io::stderr)
            .with_filter(filter);
        tracing_subscriber::registry().with(layer).try_init()
    };
    result.map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
