//! The Scrape Orchestration Service.
//!
//! This is the boundary the HTTP layer talks to. It is responsible for:
//! 1.  Validating the client identifier and app name before any state is read.
//! 2.  Running admission (trigger mode records the attempt before scraping).
//! 3.  Calling the scraper collaborator under a bounded timeout.
//! 4.  Fingerprinting the result and moving the snapshot pointer when it changed.
//! 5.  Serving status and cached reviews without scraping.

use crate::crypto::hashing::snapshot_fingerprint_with_prefix;
use crate::domain::admission::AdmissionController;
use crate::domain::client::{AppName, ClientId};
use crate::domain::clock::{Clock, SystemClock};
use crate::domain::policy::ScrapePolicy;
use crate::domain::review::ReviewRecord;
use crate::domain::schedule::{AdmissionDecision, ScheduleKey};
use crate::domain::snapshot::{CachedSnapshot, PointerUpdate, SnapshotFingerprint};
use crate::error::{Result, ScrapeError, StorageError, UpstreamError};
use crate::infra::config::DEFAULT_UPSTREAM_TIMEOUT;
use crate::infra::scraper::Scraper;
use crate::storage::{
    MemoryPointerStore, MemoryScheduleStore, MemorySnapshotCache, PointerStore, ScheduleStore,
    SnapshotCache,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

/// Attempts for the pointer compare-and-set when storage reports contention.
const POINTER_CAS_ATTEMPTS: u32 = 3;
const POINTER_CAS_BACKOFF: Duration = Duration::from_millis(20);

/// Scheduling state of a (client, app) pair as seen by a passive read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ScrapeStatus {
    pub allowed_now: bool,
    pub next_run_at: Option<DateTime<Utc>>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub remaining_seconds: i64,
    pub has_upstream_changes: bool,
}

impl ScrapeStatus {
    fn from_decision(decision: AdmissionDecision, has_upstream_changes: bool) -> Self {
        Self {
            allowed_now: decision.allowed,
            next_run_at: decision.next_run_at,
            last_run_at: decision.last_run_at,
            remaining_seconds: decision.remaining_seconds,
            has_upstream_changes,
        }
    }
}

/// Result of an admitted and completed scrape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct TriggerOutcome {
    pub success: bool,
    pub scraped_count: usize,
    #[schema(value_type = String)]
    pub fingerprint: SnapshotFingerprint,
    pub has_upstream_changes: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
}

/// Cached review set plus the scheduling state, read without scraping.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CachedReviews {
    pub app: String,
    pub data: Vec<ReviewRecord>,
    pub scrape: ScrapeStatus,
}

pub struct ScrapeService {
    admission: AdmissionController,
    pointers: Arc<dyn PointerStore>,
    snapshots: Arc<dyn SnapshotCache>,
    scraper: Arc<dyn Scraper>,
    clock: Arc<dyn Clock>,
    upstream_timeout: Duration,
}

impl ScrapeService {
    pub fn new(
        admission: AdmissionController,
        pointers: Arc<dyn PointerStore>,
        snapshots: Arc<dyn SnapshotCache>,
        scraper: Arc<dyn Scraper>,
    ) -> Self {
        Self {
            admission,
            pointers,
            snapshots,
            scraper,
            clock: Arc::new(SystemClock),
            upstream_timeout: DEFAULT_UPSTREAM_TIMEOUT,
        }
    }

    /// Service over fresh in-process stores.
    pub fn in_memory(policy: ScrapePolicy, scraper: Arc<dyn Scraper>) -> Self {
        let schedules: Arc<dyn ScheduleStore> = Arc::new(MemoryScheduleStore::new());
        Self::new(
            AdmissionController::new(schedules, policy),
            Arc::new(MemoryPointerStore::new()),
            Arc::new(MemorySnapshotCache::new()),
            scraper,
        )
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_upstream_timeout(mut self, timeout: Duration) -> Self {
        self.upstream_timeout = timeout;
        self
    }

    pub fn policy(&self) -> &ScrapePolicy {
        self.admission.policy()
    }

    /// Checks that the schedule store answers.
    pub async fn ping(&self) -> std::result::Result<(), StorageError> {
        self.admission.schedules().ping().await
    }

    /// Current admission state, without side effects.
    #[instrument(skip(self))]
    pub async fn status(&self, client_id: &str, app: &str) -> Result<ScrapeStatus> {
        let key = parse_key(client_id, app)?;
        self.status_for(&key).await
    }

    /// Admits, scrapes, fingerprints and records the snapshot.
    ///
    /// The attempt stays recorded if the scraper fails or times out. The pointer
    /// only moves after the cached snapshot has been stored.
    #[instrument(skip(self))]
    pub async fn trigger(&self, client_id: &str, app: &str) -> Result<TriggerOutcome> {
        let key = parse_key(client_id, app)?;
        let decision = self.admission.admit(&key, self.clock.now()).await?;

        let reviews = self.scrape_bounded(&key).await?;
        let fingerprint =
            snapshot_fingerprint_with_prefix(&reviews, self.policy().identity_prefix_chars());

        // Cache first: if the put fails the pointer still holds the old fingerprint.
        let stored = self.pointers.get(&key).await?;
        let pending_change = stored.as_ref() != Some(&fingerprint);
        let scraped_count = reviews.len();
        self.snapshots
            .put(
                &key,
                CachedSnapshot {
                    reviews,
                    fingerprint: fingerprint.clone(),
                    scraped_at: self.clock.now(),
                    has_upstream_changes: pending_change,
                },
            )
            .await?;

        let update = self.compare_and_set_with_retry(&key, &fingerprint).await?;
        if update.changed {
            info!(%key, %fingerprint, previous = ?update.previous.as_ref().map(|p| p.as_str()), "upstream changes detected");
        } else {
            info!(%key, %fingerprint, "scrape was a no-op");
        }

        Ok(TriggerOutcome {
            success: true,
            scraped_count,
            fingerprint,
            has_upstream_changes: update.changed,
            last_run_at: decision.last_run_at,
            next_run_at: decision.next_run_at,
        })
    }

    /// Last stored review set with the current schedule; never scrapes.
    #[instrument(skip(self))]
    pub async fn cached_reviews(&self, client_id: &str, app: &str) -> Result<CachedReviews> {
        let key = parse_key(client_id, app)?;
        let decision = self.admission.decide(&key, self.clock.now()).await?;
        let snapshot = self.snapshots.get(&key).await?;
        let has_upstream_changes = snapshot.as_ref().is_some_and(|s| s.has_upstream_changes);
        Ok(CachedReviews {
            app: key.app.to_string(),
            data: snapshot.map(|s| s.reviews).unwrap_or_default(),
            scrape: ScrapeStatus::from_decision(decision, has_upstream_changes),
        })
    }

    /// Fingerprint currently stored for the pair, if any.
    pub async fn current_fingerprint(
        &self,
        client_id: &str,
        app: &str,
    ) -> Result<Option<SnapshotFingerprint>> {
        let key = parse_key(client_id, app)?;
        Ok(self.pointers.get(&key).await?)
    }

    async fn status_for(&self, key: &ScheduleKey) -> Result<ScrapeStatus> {
        let decision = self.admission.decide(key, self.clock.now()).await?;
        let has_upstream_changes = self
            .snapshots
            .get(key)
            .await?
            .is_some_and(|s| s.has_upstream_changes);
        Ok(ScrapeStatus::from_decision(decision, has_upstream_changes))
    }

    async fn scrape_bounded(&self, key: &ScheduleKey) -> Result<Vec<ReviewRecord>> {
        // Dropping the scrape future on timeout cancels the upstream call.
        match tokio::time::timeout(self.upstream_timeout, self.scraper.scrape(&key.app)).await {
            Ok(Ok(reviews)) => Ok(reviews),
            Ok(Err(e)) => {
                warn!(%key, error = %format!("{e:#}"), "upstream scrape failed, cooldown kept");
                Err(UpstreamError::Failed(format!("{e:#}")).into())
            }
            Err(_) => {
                warn!(%key, timeout_secs = self.upstream_timeout.as_secs(), "upstream scrape timed out, cooldown kept");
                Err(UpstreamError::Timeout {
                    after_secs: self.upstream_timeout.as_secs(),
                }
                .into())
            }
        }
    }

    async fn compare_and_set_with_retry(
        &self,
        key: &ScheduleKey,
        fingerprint: &SnapshotFingerprint,
    ) -> Result<PointerUpdate> {
        let mut attempt = 1;
        loop {
            match self.pointers.compare_and_set(key, fingerprint).await {
                Ok(update) => return Ok(update),
                Err(e) if e.is_transient() && attempt < POINTER_CAS_ATTEMPTS => {
                    warn!(%key, attempt, error = %e, "pointer compare-and-set contended, retrying");
                    tokio::time::sleep(POINTER_CAS_BACKOFF * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(ScrapeError::Storage(e)),
            }
        }
    }
}

fn parse_key(client_id: &str, app: &str) -> Result<ScheduleKey> {
    let client_id = ClientId::parse(client_id)?;
    let app = AppName::parse(app)?;
    Ok(ScheduleKey::new(client_id, app))
}
