//! Scrape scheduling state for one (client, app) pair and the cooldown arithmetic on it.

use crate::domain::client::{AppName, ClientId};
use chrono::{DateTime, TimeDelta, Utc};
use std::fmt;
use std::time::Duration;

// Cooldowns beyond this are clamped so date arithmetic cannot overflow.
const MAX_INTERVAL: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

/// Key of every per-tuple store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScheduleKey {
    pub client_id: ClientId,
    pub app: AppName,
}

impl ScheduleKey {
    pub fn new(client_id: ClientId, app: AppName) -> Self {
        Self { client_id, app }
    }
}

impl fmt::Display for ScheduleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.client_id, self.app)
    }
}

/// `next_allowed_at` is derived from `last_run_at + min_interval`, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrapeSchedule {
    pub last_run_at: Option<DateTime<Utc>>,
    pub min_interval: Duration,
}

impl ScrapeSchedule {
    /// Sentinel for a tuple that has never been scraped.
    pub fn never_run(min_interval: Duration) -> Self {
        Self {
            last_run_at: None,
            min_interval,
        }
    }

    pub fn with_last_run(last_run_at: DateTime<Utc>, min_interval: Duration) -> Self {
        Self {
            last_run_at: Some(last_run_at),
            min_interval,
        }
    }

    pub fn next_allowed_at(&self) -> Option<DateTime<Utc>> {
        let last = self.last_run_at?;
        Some(
            last.checked_add_signed(interval_delta(self.min_interval))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        )
    }

    pub fn decide(&self, now: DateTime<Utc>) -> AdmissionDecision {
        let next_run_at = self.next_allowed_at();
        let (allowed, remaining_seconds) = match next_run_at {
            None => (true, 0),
            Some(next) if now >= next => (true, 0),
            Some(next) => (false, ceil_seconds(next - now)),
        };
        AdmissionDecision {
            allowed,
            remaining_seconds,
            last_run_at: self.last_run_at,
            next_run_at,
        }
    }
}

/// Result of evaluating a schedule at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionDecision {
    pub allowed: bool,
    /// Whole seconds until the next admission, rounded up; 0 when allowed.
    pub remaining_seconds: i64,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
}

/// Outcome of an atomic admit-and-record attempt against a schedule store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The attempt was recorded; `schedule` is the state after recording.
    Admitted { schedule: ScrapeSchedule },
    /// Still cooling down; nothing was written.
    Rejected { schedule: ScrapeSchedule },
}

pub(crate) fn interval_delta(interval: Duration) -> TimeDelta {
    let clamped = interval.min(MAX_INTERVAL);
    TimeDelta::milliseconds(clamped.as_millis() as i64)
}

fn ceil_seconds(delta: TimeDelta) -> i64 {
    let millis = delta.num_milliseconds().max(0);
    (millis + 999) / 1000
}
