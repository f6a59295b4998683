//! Persistent stores implemented on PostgreSQL.
//!
//! Per-key atomicity comes from the database: admission is a single conditional upsert
//! on the schedule row, and the pointer compare-and-set locks only its own row.

use crate::domain::review::ReviewRecord;
use crate::domain::schedule::{interval_delta, Admission, ScheduleKey, ScrapeSchedule};
use crate::domain::snapshot::{CachedSnapshot, PointerUpdate, SnapshotFingerprint};
use crate::error::StorageError;
use crate::storage::{PointerStore, ScheduleStore, SnapshotCache};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use std::time::Duration;
use tracing::info;

/// Opens a connection pool.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, StorageError> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Creates the three tables if they do not exist yet.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), StorageError> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS scrape_schedules (
            client_id TEXT NOT NULL,
            app_name TEXT NOT NULL,
            last_run_at TIMESTAMPTZ,
            PRIMARY KEY (client_id, app_name)
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS snapshot_pointers (
            client_id TEXT NOT NULL,
            app_name TEXT NOT NULL,
            fingerprint TEXT NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            PRIMARY KEY (client_id, app_name)
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS review_snapshots (
            client_id TEXT NOT NULL,
            app_name TEXT NOT NULL,
            fingerprint TEXT NOT NULL,
            reviews JSONB NOT NULL,
            scraped_at TIMESTAMPTZ NOT NULL,
            has_upstream_changes BOOLEAN NOT NULL,
            PRIMARY KEY (client_id, app_name)
        )",
    )
    .execute(pool)
    .await?;

    info!("scrape storage schema ready");
    Ok(())
}

#[derive(Clone)]
pub struct PostgresScheduleStore {
    pool: PgPool,
}

impl PostgresScheduleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn last_run(&self, key: &ScheduleKey) -> Result<Option<DateTime<Utc>>, StorageError> {
        let row = sqlx::query(
            "SELECT last_run_at FROM scrape_schedules WHERE client_id = $1 AND app_name = $2",
        )
        .bind(key.client_id.to_string())
        .bind(key.app.as_str())
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => Ok(row.try_get::<Option<DateTime<Utc>>, _>("last_run_at")?),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ScheduleStore for PostgresScheduleStore {
    async fn get_schedule(
        &self,
        key: &ScheduleKey,
        min_interval: Duration,
    ) -> Result<ScrapeSchedule, StorageError> {
        Ok(ScrapeSchedule {
            last_run_at: self.last_run(key).await?,
            min_interval,
        })
    }

    async fn record_attempt(&self, key: &ScheduleKey, at: DateTime<Utc>) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO scrape_schedules (client_id, app_name, last_run_at) VALUES ($1, $2, $3)
             ON CONFLICT (client_id, app_name) DO UPDATE SET last_run_at = $3",
        )
        .bind(key.client_id.to_string())
        .bind(key.app.as_str())
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn try_admit(
        &self,
        key: &ScheduleKey,
        now: DateTime<Utc>,
        min_interval: Duration,
    ) -> Result<Admission, StorageError> {
        let cutoff = now
            .checked_sub_signed(interval_delta(min_interval))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        // Compare-and-swap on the schedule row: the update only applies once the
        // previous attempt is at least `min_interval` old.
        let admitted = sqlx::query(
            "INSERT INTO scrape_schedules (client_id, app_name, last_run_at) VALUES ($1, $2, $3)
             ON CONFLICT (client_id, app_name) DO UPDATE SET last_run_at = EXCLUDED.last_run_at
             WHERE scrape_schedules.last_run_at IS NULL OR scrape_schedules.last_run_at <= $4
             RETURNING last_run_at",
        )
        .bind(key.client_id.to_string())
        .bind(key.app.as_str())
        .bind(now)
        .bind(cutoff)
        .fetch_optional(&self.pool)
        .await?;

        if admitted.is_some() {
            return Ok(Admission::Admitted {
                schedule: ScrapeSchedule::with_last_run(now, min_interval),
            });
        }

        Ok(Admission::Rejected {
            schedule: ScrapeSchedule {
                last_run_at: self.last_run(key).await?,
                min_interval,
            },
        })
    }

    async fn ping(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct PostgresPointerStore {
    pool: PgPool,
}

impl PostgresPointerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PointerStore for PostgresPointerStore {
    async fn get(&self, key: &ScheduleKey) -> Result<Option<SnapshotFingerprint>, StorageError> {
        let fingerprint: Option<String> = sqlx::query_scalar(
            "SELECT fingerprint FROM snapshot_pointers WHERE client_id = $1 AND app_name = $2",
        )
        .bind(key.client_id.to_string())
        .bind(key.app.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(fingerprint.map(SnapshotFingerprint::from_stored))
    }

    async fn compare_and_set(
        &self,
        key: &ScheduleKey,
        fingerprint: &SnapshotFingerprint,
    ) -> Result<PointerUpdate, StorageError> {
        let client_id = key.client_id.to_string();
        let mut tx = self.pool.begin().await?;

        let current: Option<String> = sqlx::query_scalar(
            "SELECT fingerprint FROM snapshot_pointers
             WHERE client_id = $1 AND app_name = $2 FOR UPDATE",
        )
        .bind(&client_id)
        .bind(key.app.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let update = match current {
            Some(stored) if stored == fingerprint.as_str() => {
                tx.rollback().await?;
                return Ok(PointerUpdate {
                    changed: false,
                    previous: Some(SnapshotFingerprint::from_stored(stored)),
                });
            }
            Some(stored) => {
                sqlx::query(
                    "UPDATE snapshot_pointers SET fingerprint = $3, updated_at = now()
                     WHERE client_id = $1 AND app_name = $2",
                )
                .bind(&client_id)
                .bind(key.app.as_str())
                .bind(fingerprint.as_str())
                .execute(&mut *tx)
                .await?;
                PointerUpdate {
                    changed: true,
                    previous: Some(SnapshotFingerprint::from_stored(stored)),
                }
            }
            None => {
                let inserted = sqlx::query(
                    "INSERT INTO snapshot_pointers (client_id, app_name, fingerprint)
                     VALUES ($1, $2, $3) ON CONFLICT (client_id, app_name) DO NOTHING",
                )
                .bind(&client_id)
                .bind(key.app.as_str())
                .bind(fingerprint.as_str())
                .execute(&mut *tx)
                .await?;
                if inserted.rows_affected() == 0 {
                    // A concurrent first write won; the caller retries against its row.
                    return Err(StorageError::Contention(format!(
                        "snapshot pointer for {} created concurrently",
                        key
                    )));
                }
                PointerUpdate {
                    changed: true,
                    previous: None,
                }
            }
        };

        tx.commit().await?;
        Ok(update)
    }
}

#[derive(Clone)]
pub struct PostgresSnapshotCache {
    pool: PgPool,
}

impl PostgresSnapshotCache {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SnapshotCache for PostgresSnapshotCache {
    async fn get(&self, key: &ScheduleKey) -> Result<Option<CachedSnapshot>, StorageError> {
        let row = sqlx::query(
            "SELECT reviews, fingerprint, scraped_at, has_upstream_changes
             FROM review_snapshots WHERE client_id = $1 AND app_name = $2",
        )
        .bind(key.client_id.to_string())
        .bind(key.app.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let reviews: Json<Vec<ReviewRecord>> = row.try_get("reviews")?;
        let fingerprint: String = row.try_get("fingerprint")?;
        Ok(Some(CachedSnapshot {
            reviews: reviews.0,
            fingerprint: SnapshotFingerprint::from_stored(fingerprint),
            scraped_at: row.try_get("scraped_at")?,
            has_upstream_changes: row.try_get("has_upstream_changes")?,
        }))
    }

    async fn put(&self, key: &ScheduleKey, snapshot: CachedSnapshot) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO review_snapshots
                (client_id, app_name, fingerprint, reviews, scraped_at, has_upstream_changes)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (client_id, app_name) DO UPDATE SET
                fingerprint = EXCLUDED.fingerprint,
                reviews = EXCLUDED.reviews,
                scraped_at = EXCLUDED.scraped_at,
                has_upstream_changes = EXCLUDED.has_upstream_changes",
        )
        .bind(key.client_id.to_string())
        .bind(key.app.as_str())
        .bind(snapshot.fingerprint.as_str())
        .bind(Json(snapshot.reviews))
        .bind(snapshot.scraped_at)
        .bind(snapshot.has_upstream_changes)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
