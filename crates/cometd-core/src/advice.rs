//! Server advice: how and when the client should reconnect.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Reconnection policy advised by the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reconnect {
    /// Re-open the tunnel with the current client id.
    Retry,
    /// Discard the client id and perform a new handshake.
    Handshake,
    /// Do not reconnect.
    #[serde(rename = "none")]
    Never,
}

impl std::fmt::Display for Reconnect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Retry => write!(f, "retry"),
            Self::Handshake => write!(f, "handshake"),
            Self::Never => write!(f, "none"),
        }
    }
}

/// The `advice` field of a Bayeux message.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Advice {
    /// Reconnection policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconnect: Option<Reconnect>,
    /// Delay in milliseconds before the next reconnect attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<u64>,
    /// Server-side long-poll timeout in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    /// Any other advice fields, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Advice {
    /// Advice carrying only a reconnect policy.
    pub fn reconnect(policy: Reconnect) -> Self {
        Self {
            reconnect: Some(policy),
            ..Self::default()
        }
    }

    /// Builder-style interval setter.
    #[must_use]
    pub fn with_interval(mut self, interval_ms: u64) -> Self {
        self.interval = Some(interval_ms);
        self
    }

    /// Merge newer advice over this one. Fields present in `newer` win.
    pub fn merge(&mut self, newer: &Advice) {
        if let Some(reconnect) = newer.reconnect {
            self.reconnect = Some(reconnect);
        }
        if let Some(interval) = newer.interval {
            self.interval = Some(interval);
        }
        if let Some(timeout) = newer.timeout {
            self.timeout = Some(timeout);
        }
        for (key, value) in &newer.extra {
            let _ = self.extra.insert(key.clone(), value.clone());
        }
    }

    /// Interval in milliseconds, `0` when unset.
    pub fn interval_ms(&self) -> u64 {
        self.interval.unwrap_or(0)
    }

    /// Whether the advice forbids any further reconnect attempt.
    pub fn forbids_reconnect(&self) -> bool {
        self.reconnect == Some(Reconnect::Never)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconnect_serde_uses_wire_names() {
        assert_eq!(serde_json::to_string(&Reconnect::Never).unwrap(), "\"none\"");
        assert_eq!(serde_json::to_string(&Reconnect::Retry).unwrap(), "\"retry\"");
        let back: Reconnect = serde_json::from_str("\"handshake\"").unwrap();
        assert_eq!(back, Reconnect::Handshake);
    }

    #[test]
    fn parses_full_advice() {
        let advice: Advice = serde_json::from_value(serde_json::json!({
            "reconnect": "retry",
            "interval": 0,
            "timeout": 30000,
            "multiple-clients": true
        }))
        .unwrap();
        assert_eq!(advice.reconnect, Some(Reconnect::Retry));
        assert_eq!(advice.interval, Some(0));
        assert_eq!(advice.timeout, Some(30000));
        assert_eq!(advice.extra["multiple-clients"], true);
    }

    #[test]
    fn merge_keeps_fields_missing_from_newer() {
        let mut current = Advice::reconnect(Reconnect::Retry).with_interval(2000);
        current.timeout = Some(30000);
        current.merge(&Advice::reconnect(Reconnect::Handshake));
        assert_eq!(current.reconnect, Some(Reconnect::Handshake));
        assert_eq!(current.interval, Some(2000));
        assert_eq!(current.timeout, Some(30000));
    }

    #[test]
    fn merge_overrides_interval() {
        let mut current = Advice::default().with_interval(5000);
        current.merge(&Advice::default().with_interval(0));
        assert_eq!(current.interval_ms(), 0);
    }

    #[test]
    fn forbids_reconnect_only_for_none() {
        assert!(Advice::reconnect(Reconnect::Never).forbids_reconnect());
        assert!(!Advice::reconnect(Reconnect::Retry).forbids_reconnect());
        assert!(!Advice::default().forbids_reconnect());
    }

    #[test]
    fn empty_advice_serializes_to_empty_object() {
        assert_eq!(
            serde_json::to_value(Advice::default()).unwrap(),
            serde_json::json!({})
        );
    }
}
