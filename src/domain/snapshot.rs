use crate::domain::review::ReviewRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 64-character lowercase hex SHA-256 digest of a review set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotFingerprint(String);

impl SnapshotFingerprint {
    pub(crate) fn from_digest(digest: &[u8]) -> Self {
        SnapshotFingerprint(hex::encode(digest))
    }

    /// Rehydrates a fingerprint read back from storage.
    pub fn from_stored(hex: String) -> Self {
        SnapshotFingerprint(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SnapshotFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of a pointer compare-and-set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointerUpdate {
    pub changed: bool,
    pub previous: Option<SnapshotFingerprint>,
}

/// The last scraped review set of a (client, app) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedSnapshot {
    pub reviews: Vec<ReviewRecord>,
    pub fingerprint: SnapshotFingerprint,
    pub scraped_at: DateTime<Utc>,
    /// Whether the scrape that produced this snapshot moved the pointer.
    pub has_upstream_changes: bool,
}
