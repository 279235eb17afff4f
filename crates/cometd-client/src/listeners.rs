//! Local subscriptions: channel (or pattern) to listener set.

use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use cometd_core::{Message, channel};
use tracing::{error, trace};

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

type Callback = Arc<dyn Fn(&Message) + Send + Sync>;

/// A callback invoked with each message delivered on a subscribed channel.
///
/// Identity is per construction: clones compare equal to each other and to
/// nothing else, so the same listener can later be passed to unsubscribe.
#[derive(Clone)]
pub struct Listener {
    id: u64,
    callback: Callback,
}

impl Listener {
    /// Wrap a callback.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        Self {
            id: NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed),
            callback: Arc::new(callback),
        }
    }

    /// Process-unique identity.
    pub fn id(&self) -> u64 {
        self.id
    }

    fn invoke(&self, message: &Message) {
        (self.callback)(message);
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Listener {}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener").field("id", &self.id).finish_non_exhaustive()
    }
}

/// Listener sets keyed by channel or wildcard pattern.
#[derive(Debug, Default)]
pub struct ListenerRegistry {
    channels: BTreeMap<String, Vec<Listener>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether anything is registered on `channel` (exact key, not pattern
    /// match).
    pub fn has_channel(&self, channel: &str) -> bool {
        self.channels.contains_key(channel)
    }

    pub fn contains(&self, channel: &str, listener: &Listener) -> bool {
        self.channels
            .get(channel)
            .is_some_and(|set| set.contains(listener))
    }

    /// Add `listener` to `channel`. Returns `false` if it was already there.
    pub fn add(&mut self, channel: &str, listener: Listener) -> bool {
        let set = self.channels.entry(channel.to_string()).or_default();
        if set.contains(&listener) {
            return false;
        }
        set.push(listener);
        true
    }

    /// Remove one listener, or every listener when `listener` is `None`.
    /// Returns how many remain on `channel`.
    pub fn remove(&mut self, channel: &str, listener: Option<&Listener>) -> usize {
        let Some(set) = self.channels.get_mut(channel) else {
            return 0;
        };
        match listener {
            Some(listener) => set.retain(|l| l != listener),
            None => set.clear(),
        }
        let remaining = set.len();
        if remaining == 0 {
            let _ = self.channels.remove(channel);
        }
        remaining
    }

    pub fn listener_count(&self, channel: &str) -> usize {
        self.channels.get(channel).map_or(0, Vec::len)
    }

    /// Registered channels and patterns, sorted.
    pub fn channels(&self) -> Vec<String> {
        self.channels.keys().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.channels.clear();
    }

    /// Invoke every listener whose channel or pattern matches `channel`.
    ///
    /// A panicking listener is logged and does not prevent the others from
    /// running. Returns the number of listeners invoked.
    pub fn dispatch(&self, channel: &str, message: &Message) -> usize {
        let targets: Vec<&Listener> = self
            .channels
            .iter()
            .filter(|(pattern, _)| channel::matches(pattern, channel))
            .flat_map(|(_, set)| set.iter())
            .collect();
        trace!(channel, listeners = targets.len(), "dispatching");
        for listener in &targets {
            let outcome = catch_unwind(AssertUnwindSafe(|| listener.invoke(message)));
            if outcome.is_err() {
                error!(channel, listener = listener.id, "listener panicked");
            }
        }
        targets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    fn recorder() -> (Listener, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let listener = Listener::new(move |m: &Message| sink.lock().push(m.channel_name().to_string()));
        (listener, seen)
    }

    #[test]
    fn clones_share_identity() {
        let listener = Listener::new(|_| {});
        assert_eq!(listener, listener.clone());
        assert_ne!(listener, Listener::new(|_| {}));
    }

    #[test]
    fn duplicate_add_is_rejected() {
        let mut registry = ListenerRegistry::new();
        let listener = Listener::new(|_| {});
        assert!(registry.add("/chat", listener.clone()));
        assert!(!registry.add("/chat", listener));
        assert_eq!(registry.listener_count("/chat"), 1);
    }

    #[test]
    fn remove_reports_remaining_and_drops_empty_channels() {
        let mut registry = ListenerRegistry::new();
        let a = Listener::new(|_| {});
        let b = Listener::new(|_| {});
        let _ = registry.add("/chat", a.clone());
        let _ = registry.add("/chat", b);
        assert_eq!(registry.remove("/chat", Some(&a)), 1);
        assert_eq!(registry.remove("/chat", None), 0);
        assert!(!registry.has_channel("/chat"));
        assert_eq!(registry.remove("/unknown", None), 0);
    }

    #[test]
    fn dispatch_reaches_exact_and_wildcard_listeners() {
        let mut registry = ListenerRegistry::new();
        let (exact, exact_seen) = recorder();
        let (one, one_seen) = recorder();
        let (deep, deep_seen) = recorder();
        let _ = registry.add("/chat/room", exact);
        let _ = registry.add("/chat/*", one);
        let _ = registry.add("/**", deep);

        let message = Message::on("/chat/room").with_data(json!("hi"));
        assert_eq!(registry.dispatch("/chat/room", &message), 3);
        assert_eq!(registry.dispatch("/chat/room/sub", &Message::on("/chat/room/sub")), 1);

        assert_eq!(exact_seen.lock().len(), 1);
        assert_eq!(one_seen.lock().len(), 1);
        assert_eq!(*deep_seen.lock(), ["/chat/room", "/chat/room/sub"]);
    }

    #[test]
    fn panicking_listener_does_not_stop_dispatch() {
        let mut registry = ListenerRegistry::new();
        let (after, seen) = recorder();
        let _ = registry.add("/a", Listener::new(|_| panic!("boom")));
        let _ = registry.add("/a", after);
        assert_eq!(registry.dispatch("/a", &Message::on("/a")), 2);
        assert_eq!(seen.lock().len(), 1);
    }
}
