// tests/state_writes.rs
// What a run writes, and when it writes nothing.
use anyhow::Result;
use chrono::{TimeZone, Utc};
use listing_watch::ingest::providers::fixture::FixtureSource;
use listing_watch::notify::MockNotifier;
use listing_watch::state::{seen_key, FileStateStore, MemoryStateStore, StateStore};
use listing_watch::{run_workflow, RunContext, SourceProvider, WatchConfig, WorkflowKind, WorkflowProfile};
use parking_lot::Mutex;
use std::path::Path;

/// Memory store that remembers which keys were written.
#[derive(Default)]
struct CountingStore {
    inner: MemoryStateStore,
    writes: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl StateStore for CountingStore {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.inner.load(key).await
    }

    async fn save(&self, key: &str, blob: &[u8]) -> Result<()> {
        self.writes.lock().push(key.to_string());
        self.inner.save(key, blob).await
    }
}

async fn digest(store: &dyn StateStore, notifier: &MockNotifier) -> listing_watch::RunReport {
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
    let ctx = RunContext {
        providers: &providers,
        store,
        notifier,
        target: "@chat",
        config: &cfg,
    };
    let now = Utc.with_ymd_and_hms(2025, 9, 6, 12, 0, 0).unwrap();
    run_workflow(&WorkflowProfile::for_kind(WorkflowKind::Digest, &cfg), &ctx, now)
        .await
        .expect("run")
}

#[tokio::test]
async fn quiet_rerun_writes_nothing() {
    let store = CountingStore::default();
    digest(&store, &MockNotifier::new()).await;
    assert_eq!(*store.writes.lock(), vec![seen_key("digest")]);

    store.writes.lock().clear();
    let before = store.inner.dump();
    let report = digest(&store, &MockNotifier::new()).await;
    assert_eq!(report.suppressed, 2);
    assert!(store.writes.lock().is_empty());
    assert_eq!(store.inner.dump(), before);
}

#[tokio::test]
async fn suppressed_listings_never_reach_the_notifier() {
    let store = CountingStore::default();
    digest(&store, &MockNotifier::new()).await;
    let seen_before = store.inner.get(&seen_key("digest"));

    store.writes.lock().clear();
    // same listings are suppressed, so nothing is even attempted
    let down = MockNotifier::failing_from(0);
    digest(&store, &down).await;
    assert_eq!(down.calls(), 0);
    assert_eq!(store.inner.get(&seen_key("digest")), seen_before);
}

#[tokio::test]
async fn file_store_round_trips_under_root() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStateStore::new(dir.path());
    digest(&store, &MockNotifier::new()).await;

    let blob = store.load(&seen_key("digest")).await.unwrap().expect("seen blob");
    let doc: serde_json::Value = serde_json::from_slice(&blob).unwrap();
    assert_eq!(doc["_metadata"]["ttl_days"], 14);
    assert!(dir.path().join("seen").join("digest.json").exists());

    let report = digest(&store, &MockNotifier::new()).await;
    assert_eq!(report.delivered, 0);
}
