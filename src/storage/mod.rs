//! Shared mutable state of the admission core.
//!
//! All three stores are keyed by [`ScheduleKey`] and must be atomic per key without
//! serialising unrelated keys. No operation spans two stores.

pub mod memory;
pub mod postgres;

use crate::domain::schedule::{Admission, ScheduleKey, ScrapeSchedule};
use crate::domain::snapshot::{CachedSnapshot, PointerUpdate, SnapshotFingerprint};
use crate::error::StorageError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

pub use memory::{MemoryPointerStore, MemoryScheduleStore, MemorySnapshotCache};
pub use postgres::{PostgresPointerStore, PostgresScheduleStore, PostgresSnapshotCache};

/// Client registry: per (client, app) scrape scheduling state.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// Returns the schedule, or the never-run sentinel for an unseen key.
    async fn get_schedule(
        &self,
        key: &ScheduleKey,
        min_interval: Duration,
    ) -> Result<ScrapeSchedule, StorageError>;

    /// Unconditionally records an attempt at `at`.
    async fn record_attempt(&self, key: &ScheduleKey, at: DateTime<Utc>) -> Result<(), StorageError>;

    /// Decides and, when allowed, records an attempt at `now` as one atomic step.
    async fn try_admit(
        &self,
        key: &ScheduleKey,
        now: DateTime<Utc>,
        min_interval: Duration,
    ) -> Result<Admission, StorageError>;

    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Snapshot pointer store: last-seen fingerprint per (client, app).
#[async_trait]
pub trait PointerStore: Send + Sync {
    async fn get(&self, key: &ScheduleKey) -> Result<Option<SnapshotFingerprint>, StorageError>;

    /// Stores `fingerprint` if it differs from (or there is no) stored value.
    async fn compare_and_set(
        &self,
        key: &ScheduleKey,
        fingerprint: &SnapshotFingerprint,
    ) -> Result<PointerUpdate, StorageError>;
}

/// Last scraped review set per (client, app), served without scraping.
#[async_trait]
pub trait SnapshotCache: Send + Sync {
    async fn get(&self, key: &ScheduleKey) -> Result<Option<CachedSnapshot>, StorageError>;

    async fn put(&self, key: &ScheduleKey, snapshot: CachedSnapshot) -> Result<(), StorageError>;
}
