//! Server clock estimation.
//!
//! Outgoing handshake and connect messages carry `ext.timesync.tc`, the local
//! send time. The server answers with `ext.timesync = {tc, ts, p}`: the echoed
//! send time, its own receive time and the time it held the request. Each
//! reply yields one offset sample
//!
//! ```text
//! sample = ts - tc - (now - tc - p) / 2
//! ```
//!
//! which is folded into a running average over a fixed window.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use cometd_core::channel::{META_CONNECT, META_HANDSHAKE};
use cometd_core::{Clock, Message, SystemClock};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tracing::trace;

use crate::extension::{Extension, ExtensionError, Transform};

/// Default number of samples in the running average.
pub const DEFAULT_WINDOW: usize = 10;

const TIMESYNC_KEY: &str = "timesync";

#[derive(Debug, Default)]
struct SyncState {
    offset: Option<f64>,
    samples: usize,
}

pub struct TimeSyncExtension {
    clock: Arc<dyn Clock>,
    window: usize,
    state: Mutex<SyncState>,
}

impl TimeSyncExtension {
    pub fn new(window: usize) -> Self {
        Self::with_clock(Arc::new(SystemClock), window)
    }

    /// A window of 0 is treated as 1.
    pub fn with_clock(clock: Arc<dyn Clock>, window: usize) -> Self {
        Self {
            clock,
            window: window.max(1),
            state: Mutex::new(SyncState::default()),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Number of samples folded in so far.
    pub fn samples(&self) -> usize {
        self.state.lock().samples
    }

    /// Estimated `server_clock - local_clock` in milliseconds, 0 before the
    /// first sample.
    #[allow(clippy::cast_possible_truncation)]
    pub fn offset(&self) -> i64 {
        self.state.lock().offset.map_or(0, |o| o.round() as i64)
    }

    /// Estimated current server time in epoch milliseconds.
    pub fn server_time(&self) -> i64 {
        self.clock.now_millis() + self.offset()
    }

    /// Local delay until the server clock reads `server_time_ms`, never
    /// less than 1 ms.
    #[allow(clippy::cast_sign_loss)]
    pub fn delay_until(&self, server_time_ms: i64) -> Duration {
        let remaining = (server_time_ms - self.server_time()).max(1);
        Duration::from_millis(remaining as u64)
    }

    /// Run `task` once the server clock reaches `server_time_ms`.
    pub fn set_timeout_at<F>(&self, server_time_ms: i64, task: F) -> tokio::task::JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let delay = self.delay_until(server_time_ms);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await
        })
    }

    #[allow(clippy::cast_precision_loss)]
    fn record(&self, sample: f64) {
        let mut state = self.state.lock();
        let window = self.window as f64;
        state.offset = Some(match state.offset {
            None => sample,
            Some(avg) => (avg * (window - 1.0) + sample) / window,
        });
        state.samples += 1;
        trace!(sample, offset = ?state.offset, samples = state.samples, "timesync sample");
    }
}

impl Default for TimeSyncExtension {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

fn is_synced_channel(message: &Message) -> bool {
    message.is_on(META_HANDSHAKE) || message.is_on(META_CONNECT)
}

fn number(sync: &Value, key: &'static str) -> Result<f64, ExtensionError> {
    sync.get(key)
        .and_then(Value::as_f64)
        .ok_or(ExtensionError::Malformed {
            field: key,
            reason: "missing or not a number".to_string(),
        })
}

impl Extension for TimeSyncExtension {
    fn name(&self) -> &str {
        "timesync"
    }

    fn outgoing(&self, message: &Message) -> Result<Transform, ExtensionError> {
        if !is_synced_channel(message) {
            return Ok(Transform::Unchanged);
        }
        let mut next = message.clone();
        let _ = next.ext_mut().insert(
            TIMESYNC_KEY.to_string(),
            json!({ "tc": self.clock.now_millis() }),
        );
        Ok(Transform::Replace(next))
    }

    #[allow(clippy::cast_precision_loss)]
    fn incoming(&self, message: &Message) -> Result<Transform, ExtensionError> {
        if !is_synced_channel(message) {
            return Ok(Transform::Unchanged);
        }
        let Some(sync) = message.ext_value(TIMESYNC_KEY) else {
            return Ok(Transform::Unchanged);
        };
        let tc = number(sync, "tc")?;
        let ts = number(sync, "ts")?;
        let p = number(sync, "p")?;
        let now = self.clock.now_millis() as f64;
        self.record(ts - tc - (now - tc - p) / 2.0);
        Ok(Transform::Unchanged)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use cometd_core::ManualClock;

    fn reply(channel: &str, tc: i64, ts: i64, p: i64) -> Message {
        serde_json::from_value(json!({
            "channel": channel,
            "successful": true,
            "ext": {"timesync": {"tc": tc, "ts": ts, "p": p}}
        }))
        .unwrap()
    }

    fn ext_at(now: i64) -> (Arc<ManualClock>, TimeSyncExtension) {
        let clock = Arc::new(ManualClock::new(now));
        let ext = TimeSyncExtension::with_clock(clock.clone(), 10);
        (clock, ext)
    }

    #[test]
    fn stamps_handshake_and_connect() {
        let (_clock, ext) = ext_at(5_000);
        for channel in [META_HANDSHAKE, META_CONNECT] {
            let out = ext.outgoing(&Message::on(channel)).unwrap();
            assert_matches!(out, Transform::Replace(m) if m.ext_value("timesync") == Some(&json!({"tc": 5000})));
        }
        assert_eq!(
            ext.outgoing(&Message::on("/chat")).unwrap(),
            Transform::Unchanged
        );
    }

    #[test]
    fn first_sample_sets_offset() {
        let (clock, ext) = ext_at(0);
        clock.set(1_200);
        // 1600 - 1000 - (1200 - 1000 - 100) / 2 = 550
        let _ = ext.incoming(&reply(META_CONNECT, 1_000, 1_600, 100)).unwrap();
        assert_eq!(ext.offset(), 550);
        assert_eq!(ext.samples(), 1);
    }

    #[test]
    fn later_samples_use_windowed_average() {
        let (clock, ext) = ext_at(1_200);
        let _ = ext.incoming(&reply(META_HANDSHAKE, 1_000, 1_600, 100)).unwrap();
        clock.set(2_200);
        // 2500 - 2000 - (2200 - 2000 - 0) / 2 = 400; (550 * 9 + 400) / 10 = 535
        let _ = ext.incoming(&reply(META_CONNECT, 2_000, 2_500, 0)).unwrap();
        assert_eq!(ext.offset(), 535);
        assert_eq!(ext.samples(), 2);
    }

    #[test]
    fn replies_without_timesync_are_ignored() {
        let (_clock, ext) = ext_at(0);
        let _ = ext.incoming(&Message::on(META_CONNECT)).unwrap();
        let _ = ext.incoming(&reply("/chat", 0, 999, 0)).unwrap();
        assert_eq!(ext.samples(), 0);
        assert_eq!(ext.offset(), 0);
    }

    #[test]
    fn malformed_timesync_is_an_error() {
        let (_clock, ext) = ext_at(0);
        let msg: Message = serde_json::from_value(json!({
            "channel": "/meta/connect",
            "ext": {"timesync": {"tc": 1, "ts": "late"}}
        }))
        .unwrap();
        assert_matches!(ext.incoming(&msg), Err(ExtensionError::Malformed { field: "ts", .. }));
        assert_eq!(ext.samples(), 0);
    }

    #[test]
    fn server_time_adds_offset() {
        let (clock, ext) = ext_at(1_200);
        let _ = ext.incoming(&reply(META_CONNECT, 1_000, 1_600, 100)).unwrap();
        clock.set(10_000);
        assert_eq!(ext.server_time(), 10_550);
    }

    #[test]
    fn delay_until_is_clamped_to_one_millisecond() {
        let (_clock, ext) = ext_at(10_000);
        assert_eq!(ext.delay_until(10_200), Duration::from_millis(200));
        assert_eq!(ext.delay_until(10_000), Duration::from_millis(1));
        assert_eq!(ext.delay_until(0), Duration::from_millis(1));
    }

    #[test]
    fn zero_window_behaves_like_one() {
        let ext = TimeSyncExtension::with_clock(Arc::new(ManualClock::new(0)), 0);
        assert_eq!(ext.window(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn set_timeout_at_waits_for_server_time() {
        let (_clock, ext) = ext_at(10_000);
        let started = tokio::time::Instant::now();
        let handle = ext.set_timeout_at(15_000, async { 42 });
        assert_eq!(handle.await.unwrap(), 42);
        assert!(started.elapsed() >= Duration::from_millis(5_000));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn constant_samples_converge_to_themselves(offset in -100_000i64..100_000, k in 1usize..30) {
                let clock = Arc::new(ManualClock::new(0));
                let ext = TimeSyncExtension::with_clock(clock.clone(), 10);
                for i in 0..k {
                    let base = i64::try_from(i).unwrap() * 1_000;
                    // Zero transit time: now == tc, p == 0, so sample == ts - tc.
                    clock.set(base);
                    let _ = ext.incoming(&reply(META_CONNECT, base, base + offset, 0)).unwrap();
                }
                prop_assert_eq!(ext.offset(), offset);
                prop_assert_eq!(ext.samples(), k);
            }

            #[test]
            fn average_stays_within_sample_range(samples in proptest::collection::vec(-5_000i64..5_000, 1..20)) {
                let clock = Arc::new(ManualClock::new(0));
                let ext = TimeSyncExtension::with_clock(clock, 10);
                for s in &samples {
                    let _ = ext.incoming(&reply(META_CONNECT, 0, *s, 0)).unwrap();
                }
                let lo = *samples.iter().min().unwrap();
                let hi = *samples.iter().max().unwrap();
                prop_assert!(ext.offset() >= lo && ext.offset() <= hi);
            }
        }
    }
}
