//! Demo that pushes a local listings file through a workflow (log output only, nothing persisted).
//!
//! Usage: `notify_demo <listings.json> [watch-args...]`, e.g. `notify_demo fixture.json window 48`.

use anyhow::Context;
use chrono::Utc;
use listing_watch::ingest::providers::fixture::FixtureSource;
use listing_watch::notify::LogNotifier;
use listing_watch::state::MemoryStateStore;
use listing_watch::workflow::DetectMode;
use listing_watch::{run_workflow, RunContext, SourceProvider, WatchConfig, WorkflowKind, WorkflowProfile};
use std::path::PathBuf;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let mut args = std::env::args().skip(1);
    let path = PathBuf::from(args.next().context("usage: notify_demo <listings.json> [workflow]")?);
    let rest: Vec<String> = args.collect();
    let kind = if rest.is_empty() {
        WorkflowKind::Window(24.0)
    } else {
        WorkflowKind::parse(&rest)?
    };

    let cfg = WatchConfig {
        send_pause_ms: 0,
        ..Default::default()
    };
    let mut profile = WorkflowProfile::for_kind(kind, &cfg);
    // a file has no history; always read it as a snapshot
    profile.detect = DetectMode::Snapshot;
    profile.persist = false;

    let source = FixtureSource::from_file("local/fixture", &path)?;
    let providers: Vec<Box<dyn SourceProvider>> = vec![Box::new(source)];
    let store = MemoryStateStore::new();
    let ctx = RunContext {
        providers: &providers,
        store: &store,
        notifier: &LogNotifier,
        target: "stdout",
        config: &cfg,
    };

    let report = run_workflow(&profile, &ctx, Utc::now()).await?;
    println!(
        "notify-demo done: {} selected, {} delivered, {} rejected",
        report.selected, report.delivered, report.rejected
    );
    Ok(())
}
