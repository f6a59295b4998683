//! In-process stores backed by `DashMap`.
//!
//! Schedule slots are `Arc<Mutex<..>>` values: the map shard guard is dropped before
//! the per-key mutex is awaited, so a busy key never holds up the rest of its shard.

use crate::domain::schedule::{Admission, ScheduleKey, ScrapeSchedule};
use crate::domain::snapshot::{CachedSnapshot, PointerUpdate, SnapshotFingerprint};
use crate::error::StorageError;
use crate::storage::{PointerStore, ScheduleStore, SnapshotCache};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

type LastRun = Arc<Mutex<Option<DateTime<Utc>>>>;

#[derive(Debug, Default)]
pub struct MemoryScheduleStore {
    slots: DashMap<ScheduleKey, LastRun>,
}

impl MemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of (client, app) pairs that have ever been admitted.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn slot(&self, key: &ScheduleKey) -> LastRun {
        let entry = self
            .slots
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(None)));
        Arc::clone(entry.value())
    }
}

#[async_trait]
impl ScheduleStore for MemoryScheduleStore {
    async fn get_schedule(
        &self,
        key: &ScheduleKey,
        min_interval: Duration,
    ) -> Result<ScrapeSchedule, StorageError> {
        // Reads never create a slot.
        let slot = self.slots.get(key).map(|e| Arc::clone(e.value()));
        let last_run_at = match slot {
            Some(slot) => *slot.lock().await,
            None => None,
        };
        Ok(ScrapeSchedule {
            last_run_at,
            min_interval,
        })
    }

    async fn record_attempt(&self, key: &ScheduleKey, at: DateTime<Utc>) -> Result<(), StorageError> {
        let slot = self.slot(key);
        let mut last = slot.lock().await;
        *last = Some(at);
        Ok(())
    }

    async fn try_admit(
        &self,
        key: &ScheduleKey,
        now: DateTime<Utc>,
        min_interval: Duration,
    ) -> Result<Admission, StorageError> {
        let slot = self.slot(key);
        let mut last = slot.lock().await;
        let current = ScrapeSchedule {
            last_run_at: *last,
            min_interval,
        };
        if !current.decide(now).allowed {
            debug!(%key, "admission rejected inside slot lock");
            return Ok(Admission::Rejected { schedule: current });
        }
        *last = Some(now);
        Ok(Admission::Admitted {
            schedule: ScrapeSchedule::with_last_run(now, min_interval),
        })
    }
}

#[derive(Debug, Default)]
pub struct MemoryPointerStore {
    pointers: DashMap<ScheduleKey, SnapshotFingerprint>,
}

impl MemoryPointerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PointerStore for MemoryPointerStore {
    async fn get(&self, key: &ScheduleKey) -> Result<Option<SnapshotFingerprint>, StorageError> {
        Ok(self.pointers.get(key).map(|e| e.value().clone()))
    }

    async fn compare_and_set(
        &self,
        key: &ScheduleKey,
        fingerprint: &SnapshotFingerprint,
    ) -> Result<PointerUpdate, StorageError> {
        // The entry guard holds the shard lock for this synchronous block only.
        match self.pointers.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get() == fingerprint {
                    return Ok(PointerUpdate {
                        changed: false,
                        previous: Some(fingerprint.clone()),
                    });
                }
                let previous = occupied.insert(fingerprint.clone());
                Ok(PointerUpdate {
                    changed: true,
                    previous: Some(previous),
                })
            }
            Entry::Vacant(vacant) => {
                vacant.insert(fingerprint.clone());
                Ok(PointerUpdate {
                    changed: true,
                    previous: None,
                })
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct MemorySnapshotCache {
    snapshots: DashMap<ScheduleKey, CachedSnapshot>,
}

impl MemorySnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotCache for MemorySnapshotCache {
    async fn get(&self, key: &ScheduleKey) -> Result<Option<CachedSnapshot>, StorageError> {
        Ok(self.snapshots.get(key).map(|e| e.value().clone()))
    }

    async fn put(&self, key: &ScheduleKey, snapshot: CachedSnapshot) -> Result<(), StorageError> {
        self.snapshots.insert(key.clone(), snapshot);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hashing::snapshot_fingerprint;
    use crate::domain::client::{AppName, ClientId};
    use crate::domain::review::ReviewRecord;

    fn key(app: &str) -> ScheduleKey {
        ScheduleKey::new(ClientId::new_random(), AppName::parse(app).unwrap())
    }

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    const MINUTE: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn unseen_key_reads_as_never_run_without_creating_a_slot() {
        let store = MemoryScheduleStore::new();
        let schedule = store.get_schedule(&key("shopify"), MINUTE).await.unwrap();
        assert_eq!(schedule, ScrapeSchedule::never_run(MINUTE));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn rejected_admission_leaves_schedule_untouched() {
        let store = MemoryScheduleStore::new();
        let k = key("shopify");
        let first = store.try_admit(&k, now(), MINUTE).await.unwrap();
        assert!(matches!(first, Admission::Admitted { .. }));

        let later = now() + chrono::TimeDelta::seconds(10);
        let second = store.try_admit(&k, later, MINUTE).await.unwrap();
        assert!(matches!(second, Admission::Rejected { .. }));

        let schedule = store.get_schedule(&k, MINUTE).await.unwrap();
        assert_eq!(schedule.last_run_at, Some(now()));
    }

    #[tokio::test]
    async fn recorded_attempt_starts_the_cooldown() {
        let store = MemoryScheduleStore::new();
        let k = key("shopify");
        store.record_attempt(&k, now()).await.unwrap();

        let schedule = store.get_schedule(&k, MINUTE).await.unwrap();
        assert_eq!(schedule.last_run_at, Some(now()));
        assert_eq!(schedule.next_allowed_at(), Some(now() + chrono::TimeDelta::seconds(60)));

        let early = store.try_admit(&k, now(), MINUTE).await.unwrap();
        assert!(matches!(early, Admission::Rejected { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_admissions_on_one_key_admit_exactly_once() {
        let store = Arc::new(MemoryScheduleStore::new());
        let k = key("shopify");

        let mut handles = Vec::new();
        for _ in 0..64 {
            let store = Arc::clone(&store);
            let k = k.clone();
            handles.push(tokio::spawn(async move {
                store.try_admit(&k, now(), MINUTE).await.unwrap()
            }));
        }

        let mut admitted = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), Admission::Admitted { .. }) {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 1);
    }

    #[tokio::test]
    async fn busy_key_does_not_block_other_keys() {
        let store = MemoryScheduleStore::new();
        let busy = key("shopify");
        let other = key("shopify");

        let busy_slot = store.slot(&busy);
        let _held = busy_slot.lock().await;

        let admitted = tokio::time::timeout(
            Duration::from_secs(1),
            store.try_admit(&other, now(), MINUTE),
        )
        .await
        .expect("other key blocked by busy key")
        .unwrap();
        assert!(matches!(admitted, Admission::Admitted { .. }));
    }

    #[tokio::test]
    async fn pointer_compare_and_set_detects_noop() {
        let store = MemoryPointerStore::new();
        let k = key("shopify");
        let reviews = vec![ReviewRecord::new("S", "2024-01-01", "ok", Some(4.0), "US")];
        let fp = snapshot_fingerprint(&reviews);

        let first = store.compare_and_set(&k, &fp).await.unwrap();
        assert!(first.changed);
        assert_eq!(first.previous, None);

        let second = store.compare_and_set(&k, &fp).await.unwrap();
        assert!(!second.changed);

        let other = snapshot_fingerprint(&[]);
        let third = store.compare_and_set(&k, &other).await.unwrap();
        assert!(third.changed);
        assert_eq!(third.previous, Some(fp));
        assert_eq!(store.get(&k).await.unwrap(), Some(other));
    }
}
