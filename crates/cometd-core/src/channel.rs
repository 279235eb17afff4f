//! Channel names.
//!
//! Channels are slash-delimited paths. Names under `/meta/` are reserved for
//! protocol control messages. Listener registrations may use the Bayeux
//! wildcards `*` (exactly one trailing segment) and `**` (one or more
//! trailing segments).

/// Handshake meta-channel.
pub const META_HANDSHAKE: &str = "/meta/handshake";
/// Connect (tunnel) meta-channel.
pub const META_CONNECT: &str = "/meta/connect";
/// Subscribe meta-channel.
pub const META_SUBSCRIBE: &str = "/meta/subscribe";
/// Unsubscribe meta-channel.
pub const META_UNSUBSCRIBE: &str = "/meta/unsubscribe";
/// Disconnect meta-channel.
pub const META_DISCONNECT: &str = "/meta/disconnect";

const META_PREFIX: &str = "/meta/";

/// Whether `channel` is a protocol meta-channel.
pub fn is_meta(channel: &str) -> bool {
    channel.starts_with(META_PREFIX)
}

/// Whether `pattern` contains a trailing wildcard segment.
pub fn is_wildcard(pattern: &str) -> bool {
    pattern.ends_with("/*") || pattern.ends_with("/**")
}

/// Whether `channel` matches `pattern`.
///
/// Non-wildcard patterns match only themselves.
pub fn matches(pattern: &str, channel: &str) -> bool {
    if let Some(prefix) = pattern.strip_suffix("**") {
        if !prefix.ends_with('/') {
            return pattern == channel;
        }
        return channel
            .strip_prefix(prefix)
            .is_some_and(|rest| !rest.is_empty());
    }
    if let Some(prefix) = pattern.strip_suffix('*') {
        if !prefix.ends_with('/') {
            return pattern == channel;
        }
        return channel
            .strip_prefix(prefix)
            .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'));
    }
    pattern == channel
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_detection() {
        assert!(is_meta(META_CONNECT));
        assert!(is_meta("/meta/anything"));
        assert!(!is_meta("/metadata"));
        assert!(!is_meta("/chat/demo"));
    }

    #[test]
    fn exact_match() {
        assert!(matches("/chat/demo", "/chat/demo"));
        assert!(!matches("/chat/demo", "/chat/other"));
    }

    #[test]
    fn single_segment_wildcard() {
        assert!(matches("/chat/*", "/chat/demo"));
        assert!(!matches("/chat/*", "/chat/demo/room"));
        assert!(!matches("/chat/*", "/chat/"));
        assert!(!matches("/chat/*", "/other/demo"));
    }

    #[test]
    fn multi_segment_wildcard() {
        assert!(matches("/chat/**", "/chat/demo"));
        assert!(matches("/chat/**", "/chat/demo/room"));
        assert!(!matches("/chat/**", "/chat"));
        assert!(!matches("/chat/**", "/chatter/x"));
    }

    #[test]
    fn star_inside_segment_is_literal() {
        assert!(matches("/chat*", "/chat*"));
        assert!(!matches("/chat*", "/chatroom"));
        assert!(is_wildcard("/a/*"));
        assert!(is_wildcard("/a/**"));
        assert!(!is_wildcard("/a*"));
    }
}
