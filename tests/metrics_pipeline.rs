// tests/metrics_pipeline.rs
#![cfg(feature = "strict-metrics")]
use chrono::{TimeZone, Utc};
use listing_watch::ingest::providers::fixture::FixtureSource;
use listing_watch::notify::MockNotifier;
use listing_watch::state::MemoryStateStore;
use listing_watch::{run_workflow, RunContext, SourceProvider, WatchConfig, WorkflowKind, WorkflowProfile};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::path::Path;

#[tokio::test]
async fn metrics_exposed_after_run() {
    // Install a local recorder for the test
    let handle = PrometheusBuilder::new().install_recorder().expect("recorder");

    let cfg = WatchConfig {
        send_pause_ms: 0,
        ..Default::default()
    };
    let src = FixtureSource::from_file(
        "SimplifyJobs/Summer2026-Internships",
        Path::new("tests/fixtures/listings_snapshot.json"),
    )
    .expect("fixture");
    let providers: Vec<Box<dyn SourceProvider>> = vec![Box::new(src)];
    let store = MemoryStateStore::new();
    let notifier = MockNotifier::failing_from(0);
    let ctx = RunContext {
        providers: &providers,
        store: &store,
        notifier: &notifier,
        target: "@chat",
        config: &cfg,
    };
    let now = Utc.with_ymd_and_hms(2025, 9, 6, 12, 0, 0).unwrap();
    let profile = WorkflowProfile::for_kind(WorkflowKind::Digest, &cfg);
    run_workflow(&profile, &ctx, now).await.expect("run");

    // Scrape metrics text and check series presence by substring
    let out = handle.render();
    for needle in [
        "watch_detected_total",
        "watch_rejected_total",
        "watch_window_dropped_total",
        "watch_filtered_total",
        "watch_delivery_failures_total",
        "watch_last_run_ts",
    ] {
        assert!(out.contains(needle), "exposition missing '{needle}'\n{out}");
    }
}
