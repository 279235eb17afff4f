//! Protocol version constants.

use std::cmp::Ordering;

/// Bayeux protocol version announced in the handshake.
pub const BAYEUX_VERSION: &str = "1.0";

/// Oldest server protocol version the client accepts.
pub const MINIMUM_VERSION: &str = "0.9";

/// `ext` key asking a same-domain server to wrap replies in `/* */`.
pub const JSON_COMMENT_FILTERED: &str = "json-comment-filtered";

/// Compare two dotted version strings segment by segment.
///
/// Numeric segments compare numerically; anything else falls back to a
/// string comparison. Missing trailing segments count as zero, so `1.0`
/// equals `1`.
pub fn compare_versions(left: &str, right: &str) -> Ordering {
    let mut lhs = left.split('.');
    let mut rhs = right.split('.');
    loop {
        match (lhs.next(), rhs.next()) {
            (None, None) => return Ordering::Equal,
            (l, r) => {
                let l = l.unwrap_or("0");
                let r = r.unwrap_or("0");
                let ord = match (l.parse::<u64>(), r.parse::<u64>()) {
                    (Ok(a), Ok(b)) => a.cmp(&b),
                    _ => l.cmp(r),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

/// Whether a server-announced version satisfies `minimum`.
///
/// A server that announces no version is accepted.
pub fn version_satisfies(announced: Option<&str>, minimum: &str) -> bool {
    announced.is_none_or(|version| compare_versions(version, minimum) != Ordering::Less)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn numeric_comparison() {
        assert_eq!(compare_versions("1.0", "0.9"), Ordering::Greater);
        assert_eq!(compare_versions("0.9", "1.0"), Ordering::Less);
        assert_eq!(compare_versions("1.10", "1.9"), Ordering::Greater);
        assert_eq!(compare_versions("1", "1.0"), Ordering::Equal);
    }

    #[test]
    fn non_numeric_segments_fall_back_to_strings() {
        assert_eq!(compare_versions("1.0beta", "1.0alpha"), Ordering::Greater);
    }

    #[test]
    fn satisfies() {
        assert!(version_satisfies(Some("1.0"), MINIMUM_VERSION));
        assert!(version_satisfies(Some("0.9"), MINIMUM_VERSION));
        assert!(!version_satisfies(Some("0.8"), MINIMUM_VERSION));
        assert!(version_satisfies(None, MINIMUM_VERSION));
    }

    proptest! {
        #[test]
        fn comparison_is_antisymmetric(a in 0u64..50, b in 0u64..50, c in 0u64..50, d in 0u64..50) {
            let left = format!("{a}.{b}");
            let right = format!("{c}.{d}");
            prop_assert_eq!(
                compare_versions(&left, &right),
                compare_versions(&right, &left).reverse()
            );
        }
    }
}
