//! Stamps every outgoing message with the local send time.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use cometd_core::{Clock, Message, SystemClock};

use crate::extension::{Extension, ExtensionError, Transform};

/// Sets `timestamp` on outgoing messages, in HTTP-date form
/// (`Tue, 15 Nov 1994 08:12:31 GMT`).
pub struct TimestampExtension {
    clock: Arc<dyn Clock>,
}

impl TimestampExtension {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

impl Default for TimestampExtension {
    fn default() -> Self {
        Self::new()
    }
}

/// Format epoch milliseconds as an HTTP date.
pub fn http_date(millis: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|t| t.format("%a, %d %b %Y %H:%M:%S GMT").to_string())
}

impl Extension for TimestampExtension {
    fn name(&self) -> &str {
        "timestamp"
    }

    fn outgoing(&self, message: &Message) -> Result<Transform, ExtensionError> {
        let now = self.clock.now_millis();
        let stamp = http_date(now).ok_or_else(|| ExtensionError::Malformed {
            field: "clock",
            reason: format!("{now} ms is out of range"),
        })?;
        let mut stamped = message.clone();
        stamped.timestamp = Some(stamp);
        Ok(Transform::Replace(stamped))
    }
}
