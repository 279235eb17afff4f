//! Transport negotiation.
//!
//! An ordered list of (connection type, predicate, factory). After a
//! successful handshake the session asks the registry for the first entry
//! whose predicate accepts the server's offer.

use std::sync::Arc;

use tracing::debug;

use crate::transport::{CallbackPolling, LongPolling, Transport};

/// What the server offered in its handshake reply.
#[derive(Clone, Copy, Debug)]
pub struct Negotiation<'a> {
    /// `supportedConnectionTypes` from the reply.
    pub supported: &'a [String],
    /// Negotiated protocol version.
    pub version: Option<&'a str>,
    /// Whether the server is on another origin.
    pub cross_domain: bool,
}

impl Negotiation<'_> {
    /// Whether the server lists `connection_type`.
    pub fn offers(&self, connection_type: &str) -> bool {
        self.supported.iter().any(|t| t == connection_type)
    }
}

type Predicate = Box<dyn Fn(&Negotiation<'_>) -> bool + Send + Sync>;
type Factory = Box<dyn Fn() -> Arc<dyn Transport> + Send + Sync>;

/// One registered connection type.
pub struct TransportEntry {
    connection_type: String,
    accepts: Predicate,
    create: Factory,
}

impl TransportEntry {
    pub fn connection_type(&self) -> &str {
        &self.connection_type
    }

    pub fn accepts(&self, negotiation: &Negotiation<'_>) -> bool {
        (self.accepts)(negotiation)
    }

    /// A fresh transport instance.
    pub fn create(&self) -> Arc<dyn Transport> {
        (self.create)()
    }
}

impl std::fmt::Debug for TransportEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportEntry")
            .field("connection_type", &self.connection_type)
            .finish_non_exhaustive()
    }
}

fn long_polling() -> Arc<dyn Transport> {
    Arc::new(LongPolling)
}

fn callback_polling() -> Arc<dyn Transport> {
    Arc::new(CallbackPolling)
}

/// Ordered transport candidates.
#[derive(Debug, Default)]
pub struct TransportRegistry {
    entries: Vec<TransportEntry>,
}

impl TransportRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Long-polling (same-domain only) followed by callback-polling.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(
            LongPolling::CONNECTION_TYPE,
            |n| !n.cross_domain && n.offers(LongPolling::CONNECTION_TYPE),
            long_polling,
        );
        registry.register(
            CallbackPolling::CONNECTION_TYPE,
            |n| n.offers(CallbackPolling::CONNECTION_TYPE),
            callback_polling,
        );
        registry
    }

    /// Append a candidate. Earlier registrations take precedence.
    pub fn register<P, F>(&mut self, connection_type: impl Into<String>, accepts: P, create: F)
    where
        P: Fn(&Negotiation<'_>) -> bool + Send + Sync + 'static,
        F: Fn() -> Arc<dyn Transport> + Send + Sync + 'static,
    {
        self.entries.push(TransportEntry {
            connection_type: connection_type.into(),
            accepts: Box::new(accepts),
            create: Box::new(create),
        });
    }

    /// Connection types in registration order, as advertised in the
    /// handshake.
    pub fn connection_types(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| e.connection_type.clone())
            .collect()
    }

    /// First entry accepting `negotiation`.
    pub fn select(&self, negotiation: &Negotiation<'_>) -> Option<&TransportEntry> {
        let selected = self.entries.iter().find(|e| e.accepts(negotiation));
        debug!(
            offered = ?negotiation.supported,
            cross_domain = negotiation.cross_domain,
            selected = selected.map(TransportEntry::connection_type),
            "transport negotiation"
        );
        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mechanism::RequestMode;

    fn offer(types: &[&str]) -> Vec<String> {
        types.iter().map(|t| (*t).to_string()).collect()
    }

    #[test]
    fn same_domain_prefers_long_polling() {
        let registry = TransportRegistry::with_defaults();
        let supported = offer(&["callback-polling", "long-polling"]);
        let negotiation = Negotiation {
            supported: &supported,
            version: Some("1.0"),
            cross_domain: false,
        };
        let entry = registry.select(&negotiation).unwrap();
        assert_eq!(entry.connection_type(), "long-polling");
        assert_eq!(entry.create().request_mode(), RequestMode::SameDomain);
    }

    #[test]
    fn cross_domain_falls_through_to_callback_polling() {
        let registry = TransportRegistry::with_defaults();
        let supported = offer(&["long-polling", "callback-polling"]);
        let negotiation = Negotiation {
            supported: &supported,
            version: Some("1.0"),
            cross_domain: true,
        };
        let entry = registry.select(&negotiation).unwrap();
        assert_eq!(entry.connection_type(), "callback-polling");
        assert_eq!(entry.create().request_mode(), RequestMode::CrossDomain);
    }

    #[test]
    fn callback_polling_accepted_same_domain_when_only_offer() {
        let registry = TransportRegistry::with_defaults();
        let supported = offer(&["callback-polling"]);
        let negotiation = Negotiation {
            supported: &supported,
            version: None,
            cross_domain: false,
        };
        assert_eq!(
            registry.select(&negotiation).unwrap().connection_type(),
            "callback-polling"
        );
    }

    #[test]
    fn nothing_matches_unknown_offer() {
        let registry = TransportRegistry::with_defaults();
        let supported = offer(&["websocket"]);
        let negotiation = Negotiation {
            supported: &supported,
            version: None,
            cross_domain: false,
        };
        assert!(registry.select(&negotiation).is_none());
    }

    #[test]
    fn custom_entries_are_consulted_in_order() {
        let mut registry = TransportRegistry::new();
        registry.register("always", |_| true, callback_polling);
        registry.register("long-polling", |_| true, long_polling);
        let negotiation = Negotiation {
            supported: &[],
            version: None,
            cross_domain: false,
        };
        assert_eq!(registry.select(&negotiation).unwrap().connection_type(), "always");
        assert_eq!(registry.connection_types(), ["always", "long-polling"]);
    }
}
