//! Scrape admission: decides whether a (client, app) pair may scrape now.
//!
//! A passive [`AdmissionController::decide`] only reads the schedule. A trigger goes
//! through [`AdmissionController::admit`], which records the attempt in the same atomic
//! step as the decision, before any upstream call is made. The attempt is never rolled
//! back, so a failing upstream still honours the cooldown.

use crate::domain::schedule::{Admission, AdmissionDecision, ScheduleKey};
use crate::domain::policy::ScrapePolicy;
use crate::error::{ScrapeError, StorageError};
use crate::storage::ScheduleStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};

pub struct AdmissionController {
    schedules: Arc<dyn ScheduleStore>,
    policy: ScrapePolicy,
}

impl AdmissionController {
    pub fn new(schedules: Arc<dyn ScheduleStore>, policy: ScrapePolicy) -> Self {
        Self { schedules, policy }
    }

    pub fn policy(&self) -> &ScrapePolicy {
        &self.policy
    }

    pub fn schedules(&self) -> &Arc<dyn ScheduleStore> {
        &self.schedules
    }

    /// Evaluates the schedule at `now` without side effects.
    pub async fn decide(
        &self,
        key: &ScheduleKey,
        now: DateTime<Utc>,
    ) -> Result<AdmissionDecision, StorageError> {
        let interval = self.policy.interval_for(&key.app);
        let schedule = self.schedules.get_schedule(key, interval).await?;
        let decision = schedule.decide(now);
        debug!(%key, allowed = decision.allowed, remaining_seconds = decision.remaining_seconds, "admission evaluated");
        Ok(decision)
    }

    /// Admits and records an attempt at `now`, or fails with [`ScrapeError::RateLimited`].
    pub async fn admit(
        &self,
        key: &ScheduleKey,
        now: DateTime<Utc>,
    ) -> Result<AdmissionDecision, ScrapeError> {
        let interval = self.policy.interval_for(&key.app);
        match self.schedules.try_admit(key, now, interval).await? {
            Admission::Admitted { schedule } => {
                info!(%key, interval_secs = interval.as_secs(), "scrape admitted");
                Ok(AdmissionDecision {
                    allowed: true,
                    remaining_seconds: 0,
                    last_run_at: schedule.last_run_at,
                    next_run_at: schedule.next_allowed_at(),
                })
            }
            Admission::Rejected { schedule } => {
                let decision = schedule.decide(now);
                let next_run_at = decision.next_run_at.unwrap_or(now);
                info!(%key, remaining_seconds = decision.remaining_seconds, "scrape rate limited");
                Err(ScrapeError::RateLimited {
                    // A rejection always carries a positive wait.
                    remaining_seconds: decision.remaining_seconds.max(1),
                    next_run_at,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::client::{AppName, ClientId};
    use crate::storage::MemoryScheduleStore;
    use chrono::TimeDelta;
    use std::time::Duration;

    fn controller(interval_secs: u64) -> AdmissionController {
        AdmissionController::new(
            Arc::new(MemoryScheduleStore::new()),
            ScrapePolicy::new(Duration::from_secs(interval_secs)),
        )
    }

    fn key(client: ClientId, app: &str) -> ScheduleKey {
        ScheduleKey::new(client, AppName::parse(app).unwrap())
    }

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[tokio::test]
    async fn cooldown_is_monotonic() {
        let ctl = controller(300);
        let k = key(ClientId::new_random(), "shopify");

        assert!(ctl.decide(&k, t0()).await.unwrap().allowed);
        let admitted = ctl.admit(&k, t0()).await.unwrap();
        assert_eq!(admitted.last_run_at, Some(t0()));
        assert_eq!(admitted.next_run_at, Some(t0() + TimeDelta::seconds(300)));

        let passive = ctl.decide(&k, t0() + TimeDelta::seconds(100)).await.unwrap();
        assert!(!passive.allowed);
        assert_eq!(passive.remaining_seconds, 200);

        match ctl.admit(&k, t0() + TimeDelta::seconds(100)).await {
            Err(ScrapeError::RateLimited { remaining_seconds, next_run_at }) => {
                assert_eq!(remaining_seconds, 200);
                assert_eq!(next_run_at, t0() + TimeDelta::seconds(300));
            }
            other => panic!("expected rate limit, got {other:?}"),
        }

        assert!(ctl.admit(&k, t0() + TimeDelta::seconds(300)).await.is_ok());
    }

    #[tokio::test]
    async fn decide_has_no_side_effects() {
        let ctl = controller(60);
        let k = key(ClientId::new_random(), "shopify");
        for _ in 0..3 {
            assert!(ctl.decide(&k, t0()).await.unwrap().allowed);
        }
        assert!(ctl.admit(&k, t0()).await.is_ok());
    }

    #[tokio::test]
    async fn clients_and_apps_are_isolated() {
        let ctl = controller(60);
        let alice = ClientId::new_random();
        let bob = ClientId::new_random();

        ctl.admit(&key(alice, "shopify"), t0()).await.unwrap();

        assert!(!ctl.decide(&key(alice, "shopify"), t0()).await.unwrap().allowed);
        assert!(ctl.decide(&key(bob, "shopify"), t0()).await.unwrap().allowed);
        assert!(ctl.decide(&key(alice, "woocommerce"), t0()).await.unwrap().allowed);
    }

    #[tokio::test]
    async fn per_app_interval_is_applied() {
        let ctl = AdmissionController::new(
            Arc::new(MemoryScheduleStore::new()),
            ScrapePolicy::new(Duration::from_secs(3600))
                .with_app_interval("fast", Duration::from_secs(5)),
        );
        let k = key(ClientId::new_random(), "fast");
        ctl.admit(&k, t0()).await.unwrap();
        assert!(ctl.admit(&k, t0() + TimeDelta::seconds(5)).await.is_ok());
    }
}
