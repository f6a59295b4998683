//! Domain types of the scrape admission and change-detection core.

pub mod admission;
pub mod client;
pub mod clock;
pub mod policy;
pub mod review;
pub mod schedule;
pub mod snapshot;

pub use admission::AdmissionController;
pub use client::{AppName, ClientId};
pub use clock::{Clock, ManualClock, SystemClock};
pub use policy::ScrapePolicy;
pub use review::ReviewRecord;
pub use schedule::{Admission, AdmissionDecision, ScheduleKey, ScrapeSchedule};
pub use snapshot::{CachedSnapshot, PointerUpdate, SnapshotFingerprint};
