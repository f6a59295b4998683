//! Error taxonomy for the admission and change-detection core.
//!
//! Every failure a caller can observe is one of the four [`ScrapeError`] kinds. Each kind
//! keeps its structured fields so the transport layer can surface them verbatim.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// A request was malformed before any state was consulted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("client_id must be a hyphenated UUID, got '{0}'")]
    MalformedClientId(String),

    #[error("invalid app name '{0}'")]
    InvalidAppName(String),
}

/// The external scraper collaborator failed after admission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    #[error("upstream scrape timed out after {after_secs}s")]
    Timeout { after_secs: u64 },

    #[error("upstream scrape failed: {0}")]
    Failed(String),
}

/// Schedule, pointer or snapshot storage could not complete an operation.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Another writer won a race on the same key; safe to retry.
    #[error("storage contention: {0}")]
    Contention(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StorageError {
    /// True for contention that a bounded local retry may resolve.
    pub fn is_transient(&self) -> bool {
        match self {
            StorageError::Contention(_) => true,
            // serialization_failure / deadlock_detected
            StorageError::Sqlx(sqlx::Error::Database(db)) => {
                matches!(db.code().as_deref(), Some("40001") | Some("40P01"))
            }
            _ => false,
        }
    }
}

/// Errors surfaced by the scrape orchestration API.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("scrape rate limited, next run allowed in {remaining_seconds}s")]
    RateLimited {
        remaining_seconds: i64,
        next_run_at: DateTime<Utc>,
    },

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ScrapeError {
    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ScrapeError::Validation(_) => "validation_error",
            ScrapeError::RateLimited { .. } => "rate_limited",
            ScrapeError::Upstream(_) => "upstream_scrape_error",
            ScrapeError::Storage(_) => "storage_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, ScrapeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contention_is_transient_but_unavailable_is_not() {
        assert!(StorageError::Contention("lost insert race".into()).is_transient());
        assert!(!StorageError::Unavailable("pool closed".into()).is_transient());
        assert!(!StorageError::Sqlx(sqlx::Error::PoolTimedOut).is_transient());
    }

    #[test]
    fn kinds_are_distinct() {
        let validation = ScrapeError::from(ValidationError::MalformedClientId("x".into()));
        let upstream = ScrapeError::from(UpstreamError::Timeout { after_secs: 3 });
        let limited = ScrapeError::RateLimited {
            remaining_seconds: 10,
            next_run_at: Utc::now(),
        };
        assert_eq!(validation.kind(), "validation_error");
        assert_eq!(upstream.kind(), "upstream_scrape_error");
        assert_eq!(limited.kind(), "rate_limited");
        assert!(limited.to_string().contains("10s"));
    }
}
