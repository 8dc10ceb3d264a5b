//! listing-watch — Binary Entrypoint
//! One run of one workflow per invocation; scheduling is left to cron.
//!
//! Usage: `listing-watch [watch | digest | recent N | today | window H]`

use anyhow::{Context, Result};
use listing_watch::ingest::providers::github::GithubSource;
use listing_watch::notify::{LogNotifier, Notifier, TelegramNotifier};
use listing_watch::state::FileStateStore;
use listing_watch::{run_workflow, RunContext, SourceProvider, WatchConfig, WorkflowKind, WorkflowProfile};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact logs by default, JSON when `LOG_FORMAT=json`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("listing_watch=info,warn"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

async fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let kind = WorkflowKind::parse(&args)?;
    let cfg = WatchConfig::load().context("loading configuration")?;

    let mut profile = WorkflowProfile::for_kind(kind, &cfg);
    if cfg.dry_run {
        profile.persist = false;
    }

    // Credentials are checked before any state is read.
    let (notifier, target): (Box<dyn Notifier>, String) = if cfg.dry_run {
        (Box::new(LogNotifier), "dry-run".to_string())
    } else {
        let tg = TelegramNotifier::from_env()?;
        (Box::new(tg), cfg.telegram_target()?.to_string())
    };

    let providers = cfg
        .sources
        .iter()
        .map(|repo| {
            GithubSource::new(repo.as_str(), cfg.listings_path.as_str())
                .map(|s| Box::new(s.with_token(cfg.gh_token.clone())) as Box<dyn SourceProvider>)
        })
        .collect::<Result<Vec<_>>>()?;
    let store = FileStateStore::new(&cfg.state_dir);

    tracing::info!(
        workflow = %kind,
        identity = %profile.identity,
        sources = ?cfg.sources,
        filter = %profile.time_filter,
        dry_run = cfg.dry_run,
        "starting run"
    );

    let ctx = RunContext {
        providers: &providers,
        store: &store,
        notifier: notifier.as_ref(),
        target: &target,
        config: &cfg,
    };
    let report = run_workflow(&profile, &ctx, chrono::Utc::now()).await?;
    if report.chunks_failed > 0 {
        tracing::warn!(queued = report.queued, "some listings were not delivered and will be retried");
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    if let Err(e) = run().await {
        tracing::error!(error = ?e, "run aborted");
        std::process::exit(1);
    }
}
