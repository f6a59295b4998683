//! Incremental heap use of the snapshot fingerprint.
//!
//! Runs as its own test binary so the counting allocator only sees this test.

use scrape_gate::{snapshot_fingerprint, ReviewRecord};
use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicUsize, Ordering};

struct PeakTracking;

static LIVE: AtomicUsize = AtomicUsize::new(0);
static PEAK: AtomicUsize = AtomicUsize::new(0);

unsafe impl GlobalAlloc for PeakTracking {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc(layout);
        if !ptr.is_null() {
            let live = LIVE.fetch_add(layout.size(), Ordering::SeqCst) + layout.size();
            PEAK.fetch_max(live, Ordering::SeqCst);
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout);
        LIVE.fetch_sub(layout.size(), Ordering::SeqCst);
    }
}

#[global_allocator]
static ALLOCATOR: PeakTracking = PeakTracking;

const BUDGET_BYTES: usize = 50 * 1024 * 1024;

fn synthetic(count: usize) -> Vec<ReviewRecord> {
    (0..count)
        .map(|i| {
            ReviewRecord::new(
                format!("Store {}", i % 101),
                format!("2024-{:02}-{:02}", i % 12 + 1, i % 28 + 1),
                format!("Review number {i} with enough text to exceed the identity prefix length."),
                Some((i % 5 + 1) as f64),
                "United States",
            )
        })
        .collect()
}

#[test]
fn ten_thousand_reviews_stay_under_50_mb_incremental() {
    let reviews = synthetic(10_000);

    let baseline = LIVE.load(Ordering::SeqCst);
    PEAK.store(baseline, Ordering::SeqCst);

    let fp = snapshot_fingerprint(&reviews);

    let incremental = PEAK.load(Ordering::SeqCst).saturating_sub(baseline);
    assert_eq!(fp.as_str().len(), 64);
    assert!(
        incremental < BUDGET_BYTES,
        "fingerprinting 10,000 reviews peaked at {incremental} extra bytes"
    );
}
