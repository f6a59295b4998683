// This file turns a set of scraped reviews into a single order-independent digest.

use crate::domain::policy::DEFAULT_IDENTITY_PREFIX_CHARS;
use crate::domain::review::ReviewRecord;
use crate::domain::snapshot::SnapshotFingerprint;
use md5::Md5;
use sha2::{Digest, Sha256};

// Joins the sorted per-record tokens before the final digest.
const TOKEN_DELIMITER: &str = "|";

/// Takes the first `max_chars` characters (not bytes) of `text`.
fn content_prefix(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Stable identity of a review: MD5 over store, date and a short content prefix.
///
/// Rating and country are left out so an edited rating does not make the review
/// look new.
pub fn review_identity(record: &ReviewRecord, prefix_chars: usize) -> String {
    let mut hasher = Md5::new();
    hasher.update(record.store_name.as_bytes());
    hasher.update(b"_");
    hasher.update(record.review_date.as_bytes());
    hasher.update(b"_");
    hasher.update(content_prefix(&record.review_content, prefix_chars).as_bytes());
    hex::encode(hasher.finalize())
}

/// Per-record token that takes part in the snapshot digest.
fn record_token(record: &ReviewRecord, prefix_chars: usize) -> String {
    let mut token = review_identity(record, prefix_chars);
    token.push('_');
    token.push_str(&record.review_date);
    token
}

/// Fingerprints a review set with an explicit identity prefix length.
///
/// Tokens are sorted before joining, so upstream reordering never changes the
/// result. An empty set hashes the empty string.
pub fn snapshot_fingerprint_with_prefix(
    records: &[ReviewRecord],
    prefix_chars: usize,
) -> SnapshotFingerprint {
    let mut tokens: Vec<String> = records
        .iter()
        .map(|r| record_token(r, prefix_chars))
        .collect();
    tokens.sort_unstable();

    // Stream the join into the hasher instead of building one large string.
    let mut hasher = Sha256::new();
    for (i, token) in tokens.iter().enumerate() {
        if i > 0 {
            hasher.update(TOKEN_DELIMITER.as_bytes());
        }
        hasher.update(token.as_bytes());
    }
    SnapshotFingerprint::from_digest(&hasher.finalize())
}

/// Fingerprints a review set using the default 50-character identity prefix.
pub fn snapshot_fingerprint(records: &[ReviewRecord]) -> SnapshotFingerprint {
    snapshot_fingerprint_with_prefix(records, DEFAULT_IDENTITY_PREFIX_CHARS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review(store: &str, date: &str, content: &str) -> ReviewRecord {
        ReviewRecord::new(store, date, content, Some(5.0), "United States")
    }

    #[test]
    fn prefix_respects_char_boundaries() {
        assert_eq!(content_prefix("héllo wörld", 4), "héll");
        assert_eq!(content_prefix("short", 50), "short");
        assert_eq!(content_prefix("", 50), "");
    }

    #[test]
    fn identity_matches_joined_md5() {
        let r = review("Acme", "2024-01-15", "Great app");
        let expected = hex::encode(Md5::digest(b"Acme_2024-01-15_Great app"));
        assert_eq!(review_identity(&r, 50), expected);
    }

    #[test]
    fn identity_ignores_rating_and_tail_of_content() {
        let base = review("Acme", "2024-01-15", &"x".repeat(50));
        let mut edited = base.clone();
        edited.rating = Some(1.0);
        edited.country_name = "Canada".to_string();
        edited.review_content.push_str(" (edited later)");
        assert_eq!(review_identity(&base, 50), review_identity(&edited, 50));
    }

    #[test]
    fn fingerprint_matches_sorted_join() {
        let a = review("A", "2024-01-02", "one");
        let b = review("B", "2024-01-01", "two");
        let mut tokens = vec![record_token(&a, 50), record_token(&b, 50)];
        tokens.sort();
        let expected = hex::encode(Sha256::digest(tokens.join("|").as_bytes()));
        assert_eq!(snapshot_fingerprint(&[b, a]).as_str(), expected);
    }

    #[test]
    fn empty_set_hashes_empty_string() {
        let expected = hex::encode(Sha256::digest(b""));
        assert_eq!(snapshot_fingerprint(&[]).as_str(), expected);
    }
}
