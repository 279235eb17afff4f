//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and `#[serde(default)]`
//! so a settings file only needs the fields it changes.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type for the cometd client.
///
/// ```json
/// {
///   "server": { "url": "http://localhost:8080/cometd" },
///   "backoff": { "stepMs": 500 }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CometdSettings {
    /// Server location and page origin.
    pub server: ServerSettings,
    /// Protocol version negotiation.
    pub protocol: ProtocolSettings,
    /// Backoff applied after failed handshakes and connects.
    pub backoff: BackoffSettings,
    /// HTTP request behaviour.
    pub request: RequestSettings,
    /// Built-in extensions.
    pub extensions: ExtensionSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl CometdSettings {
    /// Reject combinations the client cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.backoff.max_interval_ms < self.backoff.step_ms {
            return Err(SettingsError::InvalidValue(format!(
                "backoff.maxIntervalMs ({}) is below backoff.stepMs ({})",
                self.backoff.max_interval_ms, self.backoff.step_ms
            )));
        }
        if self.extensions.timesync_window == 0 {
            return Err(SettingsError::InvalidValue(
                "extensions.timesyncWindow must be positive".to_string(),
            ));
        }
        if self.request.callback_param.is_empty() {
            return Err(SettingsError::InvalidValue(
                "request.callbackParam must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Where the client connects from and to.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Default server URL used when `init` is called without one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Origin the client is considered to run on, e.g.
    /// `http://example.com`. Servers on another host or port are reached
    /// cross-domain. When unset every server is same-domain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_origin: Option<String>,
}

/// Protocol versions announced in the handshake.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProtocolSettings {
    pub version: String,
    pub minimum_version: String,
}

impl Default for ProtocolSettings {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            minimum_version: "0.9".to_string(),
        }
    }
}

/// Reconnect backoff.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackoffSettings {
    /// Added to the advised interval after each consecutive failure.
    pub step_ms: u64,
    /// Upper bound for the advised interval.
    pub max_interval_ms: u64,
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            step_ms: 1000,
            max_interval_ms: 30_000,
        }
    }
}

/// HTTP request settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestSettings {
    /// Per-request timeout. Must exceed the server's long-poll timeout.
    pub timeout_ms: u64,
    /// TCP connect timeout.
    pub connect_timeout_ms: u64,
    /// Query parameter naming the callback for cross-domain requests.
    pub callback_param: String,
}

impl Default for RequestSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 60_000,
            connect_timeout_ms: 10_000,
            callback_param: "jsonp".to_string(),
        }
    }
}

/// Built-in extension switches.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtensionSettings {
    /// Stamp outgoing messages with the send time.
    pub timestamp: bool,
    /// Estimate the server clock offset.
    pub timesync: bool,
    /// Number of samples in the time-sync running average.
    pub timesync_window: usize,
    /// Channel on which the server hands out session tokens.
    pub session_channel: String,
}

impl Default for ExtensionSettings {
    fn default() -> Self {
        Self {
            timestamp: true,
            timesync: true,
            timesync_window: 10,
            session_channel: "/service/session".to_string(),
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
