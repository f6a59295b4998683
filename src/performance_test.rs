// src/performance_test.rs
// Measures how long the content fingerprint takes for large synthetic review sets.
use rand::seq::SliceRandom;
use rand::Rng;
use std::time::Instant;

use scrape_gate::crypto::hashing;
use scrape_gate::ReviewRecord;

fn synthetic_reviews(count: usize) -> Vec<ReviewRecord> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|i| {
            let random_data = rng.gen::<[u8; 32]>();
            ReviewRecord::new(
                format!("Store {}", i % 97),
                format!("2024-{:02}-{:02}", (i % 12) + 1, (i % 28) + 1),
                format!("Review {} body {}", i, hex::encode(random_data)),
                Some(rng.gen_range(1..=5) as f64),
                "United States",
            )
        })
        .collect()
}

fn main() {
    for num_items in [1_000usize, 10_000] {
        println!("--- Fingerprint Performance Test: {} reviews ---", num_items);
        let mut reviews = synthetic_reviews(num_items);

        let start_time = Instant::now();
        let fingerprint = hashing::snapshot_fingerprint(&reviews);
        let duration = start_time.elapsed();

        // Same set, shuffled: must produce the same digest.
        reviews.shuffle(&mut rand::thread_rng());
        let shuffled = hashing::snapshot_fingerprint(&reviews);

        let avg_time_per_item = duration.as_micros() as f64 / num_items as f64;
        println!("Fingerprint: {}", fingerprint);
        println!("Order independent: {}", fingerprint == shuffled);
        println!("Total time: {} ms", duration.as_millis());
        println!("Average time per review: {:.2} µs (microseconds)\n", avg_time_per_item);
    }
}
