pub mod app;
pub mod crypto;
pub mod domain;
pub mod error;
pub mod infra;
pub mod storage;
pub mod transport;

// Convenience re-exports (keeps call-sites clean)
pub use app::scrape_service::{CachedReviews, ScrapeService, ScrapeStatus, TriggerOutcome};
pub use crypto::hashing::{review_identity, snapshot_fingerprint, snapshot_fingerprint_with_prefix};
pub use domain::{AdmissionController, AppName, ClientId, ReviewRecord, ScrapePolicy, SnapshotFingerprint};
pub use error::{ScrapeError, StorageError, UpstreamError, ValidationError};
pub use infra::scraper::{HttpJsonScraper, Scraper};
