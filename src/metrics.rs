// src/metrics.rs
//! Metric names and their one-time registration.
//!
//! The crate only records through the `metrics` facade; installing an
//! exporter is left to the embedding process (tests use Prometheus).

use metrics::{describe_counter, describe_gauge};
use once_cell::sync::OnceCell;

pub const DETECTED: &str = "watch_detected_total";
pub const REJECTED: &str = "watch_rejected_total";
pub const DEDUP: &str = "watch_dedup_total";
pub const WINDOW_DROPPED: &str = "watch_window_dropped_total";
pub const FILTERED: &str = "watch_filtered_total";
pub const SUPPRESSED: &str = "watch_suppressed_total";
pub const DELIVERED: &str = "watch_delivered_total";
pub const DELIVERY_FAILURES: &str = "watch_delivery_failures_total";
pub const LAST_RUN_TS: &str = "watch_last_run_ts";

/// One-time metrics registration (so series carry descriptions).
pub fn ensure_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(DETECTED, "Candidate listings produced by change detection.");
        describe_counter!(REJECTED, "Fetched records rejected by normalization.");
        describe_counter!(DEDUP, "Listings dropped as cross-source duplicates.");
        describe_counter!(WINDOW_DROPPED, "Listings outside the time window.");
        describe_counter!(FILTERED, "Listings dropped by category or degree policy.");
        describe_counter!(SUPPRESSED, "Listings suppressed by the seen-cache.");
        describe_counter!(DELIVERED, "Listings in chunks whose delivery was confirmed.");
        describe_counter!(DELIVERY_FAILURES, "Chunks whose delivery failed.");
        describe_gauge!(LAST_RUN_TS, "Unix ts when a workflow run last completed.");
    });
}
