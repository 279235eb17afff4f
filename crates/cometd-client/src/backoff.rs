//! Reconnect backoff.

use cometd_settings::BackoffSettings;

/// Grows the advised reconnect interval after each consecutive failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Added per failure.
    pub step_ms: u64,
    /// Upper bound reached by stepping.
    pub max_interval_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from(&BackoffSettings::default())
    }
}

impl From<&BackoffSettings> for BackoffPolicy {
    fn from(settings: &BackoffSettings) -> Self {
        Self {
            step_ms: settings.step_ms,
            max_interval_ms: settings.max_interval_ms,
        }
    }
}

impl BackoffPolicy {
    /// Interval to use after one more failure.
    ///
    /// Never decreases: a server-advised interval already above the cap is
    /// kept as is.
    #[must_use]
    pub fn next_interval(&self, current_ms: u64) -> u64 {
        if current_ms >= self.max_interval_ms {
            return current_ms;
        }
        current_ms
            .saturating_add(self.step_ms)
            .min(self.max_interval_ms)
    }
}
