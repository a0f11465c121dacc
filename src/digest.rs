//! Content-addressed change detection.
//!
//! Publication is gated on the digest of the raw feed text, compared against
//! the digest stored by the previous run. The gate runs before repair and
//! parse, so an unchanged-but-still-broken feed is not reprocessed every
//! cycle.

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of the given text.
pub fn content_digest(content: &str) -> String {
    format!("{:x}", Sha256::digest(content.as_bytes()))
}

/// Whether the feed differs from the previously published one.
///
/// True when no previous digest exists or when the stored digest (trimmed of
/// incidental whitespace) differs from the current content's.
pub fn should_publish(raw: &str, previous: Option<&str>) -> bool {
    let current = content_digest(raw);
    match previous {
        None => {
            tracing::info!(digest = %current, "No previous digest, publishing");
            true
        }
        Some(prev) if prev.trim() == current => false,
        Some(prev) => {
            tracing::info!(old = %prev.trim(), new = %current, "Feed content changed");
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_when_no_previous_digest() {
        assert!(should_publish("<tv></tv>", None));
    }

    #[test]
    fn test_idempotent_on_identical_content() {
        let raw = "<tv><programme/></tv>";
        let stored = content_digest(raw);
        assert!(!should_publish(raw, Some(&stored)));
    }

    #[test]
    fn test_stored_digest_whitespace_is_incidental() {
        let raw = "<tv></tv>";
        let stored = format!("  {}\n", content_digest(raw));
        assert!(!should_publish(raw, Some(&stored)));
    }

    #[test]
    fn test_changed_content_publishes() {
        let stored = content_digest("<tv>old</tv>");
        assert!(should_publish("<tv>new</tv>", Some(&stored)));
    }

    proptest::proptest! {
        /// Any single-byte flip changes the digest.
        #[test]
        fn prop_digest_sensitive_to_single_byte(s in ".{1,64}", idx in 0usize..64) {
            let bytes: Vec<char> = s.chars().collect();
            proptest::prop_assume!(idx < bytes.len());

            let mut mutated: Vec<char> = bytes.clone();
            mutated[idx] = if mutated[idx] == 'x' { 'y' } else { 'x' };
            proptest::prop_assume!(mutated != bytes);

            let original: String = bytes.into_iter().collect();
            let changed: String = mutated.into_iter().collect();
            proptest::prop_assert_ne!(content_digest(&original), content_digest(&changed));
        }
    }
}
