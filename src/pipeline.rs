// src/pipeline.rs
//! One run of a workflow, end to end.
//!
//! load state → detect per source → carry-over + dedup → window → policy →
//! seen-cache → sort/limit → render/pack → deliver chunk by chunk → commit.
//!
//! Nothing is written before the commit step, and a run that fails before
//! it (source or state errors) writes nothing at all. Seen entries are only
//! recorded for listings in chunks whose delivery was confirmed.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use std::collections::HashSet;
use std::time::Duration;

use crate::change_detector::{detect_commits, detect_snapshot, CommitModeOptions, Detection};
use crate::config::WatchConfig;
use crate::dedup::dedup_first_seen;
use crate::format::{pack_lines, render_line};
use crate::identity::{canonical_key, CanonicalKey};
use crate::ingest::types::{Listing, SourceProvider};
use crate::metrics as m;
use crate::notify::Notifier;
use crate::seen_cache::{AlertDecision, AlertReason, SeenCache};
use crate::state::{marker_key, pending_key, seen_key, StateStore};
use crate::window::apply_window;
use crate::workflow::{DetectMode, SeenPolicy, WorkflowProfile};

/// Everything a run talks to.
pub struct RunContext<'a> {
    /// In dedup priority order.
    pub providers: &'a [Box<dyn SourceProvider>],
    pub store: &'a dyn StateStore,
    pub notifier: &'a dyn Notifier,
    pub target: &'a str,
    pub config: &'a WatchConfig,
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub identity: String,
    pub detected: usize,
    pub rejected: usize,
    pub carried_over: usize,
    pub deduped: usize,
    pub window_dropped: usize,
    pub filtered: usize,
    pub suppressed: usize,
    pub selected: usize,
    pub delivered: usize,
    pub chunks_sent: usize,
    pub chunks_failed: usize,
    /// Listings queued for the next run (undelivered or over the limit).
    pub queued: usize,
    pub markers_advanced: usize,
    pub decisions: Vec<(CanonicalKey, AlertReason)>,
}

async fn load_marker(store: &dyn StateStore, key: &str) -> Result<Option<String>> {
    let blob = store
        .load(key)
        .await
        .with_context(|| format!("loading marker {key}"))?;
    Ok(blob
        .map(|b| String::from_utf8_lossy(&b).trim().to_string())
        .filter(|s| !s.is_empty()))
}

async fn load_pending(store: &dyn StateStore, key: &str) -> Result<Vec<Listing>> {
    match store
        .load(key)
        .await
        .with_context(|| format!("loading carry-over queue {key}"))?
    {
        None => Ok(Vec::new()),
        Some(b) if b.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
        Some(b) => serde_json::from_slice(&b).with_context(|| format!("decoding carry-over queue {key}")),
    }
}

fn keys_of(listings: &[Listing]) -> Vec<CanonicalKey> {
    listings.iter().map(canonical_key).collect()
}

/// Run `profile` once at `now`.
pub async fn run_workflow(
    profile: &WorkflowProfile,
    ctx: &RunContext<'_>,
    now: DateTime<Utc>,
) -> Result<RunReport> {
    m::ensure_described();
    let cfg = ctx.config;
    let identity = profile.identity.as_str();
    let mut report = RunReport {
        identity: identity.to_string(),
        ..Default::default()
    };

    // 1) state
    let seen = match profile.seen {
        SeenPolicy::Enforce => {
            let blob = ctx
                .store
                .load(&seen_key(identity))
                .await
                .with_context(|| format!("loading seen-cache for {identity}"))?;
            Some(SeenCache::load(blob.as_deref(), cfg.seen_ttl_days, now)?)
        }
        SeenPolicy::Bypass => None,
    };
    let pending = if profile.persist {
        load_pending(ctx.store, &pending_key(identity)).await?
    } else {
        Vec::new()
    };
    let pending_keys_before = keys_of(&pending);

    // 2) detection; any source error aborts the run
    let opts = CommitModeOptions {
        watch_paths: cfg.watch_paths.clone(),
        history_depth: cfg.history_depth,
        directive: cfg.directive,
    };
    let mut detections: Vec<(Option<String>, Detection)> = Vec::with_capacity(ctx.providers.len());
    for p in ctx.providers {
        let det = match profile.detect {
            DetectMode::Commits => {
                let marker = load_marker(ctx.store, &marker_key(identity, p.name())).await?;
                let det = detect_commits(p.as_ref(), marker.as_deref(), &opts).await?;
                (marker, det)
            }
            DetectMode::Snapshot => (None, detect_snapshot(p.as_ref()).await?),
        };
        detections.push(det);
    }

    // 3) sources in configured order, then carry-over; a fresh copy beats a queued one
    report.carried_over = pending.len();
    let mut candidates: Vec<Listing> = Vec::new();
    for (_, det) in &detections {
        report.detected += det.candidates.len();
        report.rejected += det.rejected.len();
        candidates.extend(det.candidates.iter().cloned());
    }
    candidates.extend(pending);
    counter!(m::DETECTED).increment(report.detected as u64);
    counter!(m::REJECTED).increment(report.rejected as u64);

    let deduped = dedup_first_seen(candidates);
    report.deduped = deduped.dropped.len();
    counter!(m::DEDUP).increment(report.deduped as u64);

    // 4) window
    let (in_window, dropped) = apply_window(deduped.kept, profile.time_filter, now);
    report.window_dropped = dropped;
    counter!(m::WINDOW_DROPPED).increment(dropped as u64);

    // 5) category / degree policy
    let before = in_window.len();
    let allowed: Vec<Listing> = in_window
        .into_iter()
        .filter(|l| profile.categories.permits(l.category) && profile.graduate.permits(l.requires_graduate_degree))
        .collect();
    report.filtered = before - allowed.len();
    counter!(m::FILTERED).increment(report.filtered as u64);

    // 6) seen-cache
    let mut selected: Vec<Listing> = Vec::with_capacity(allowed.len());
    for l in allowed {
        let key = canonical_key(&l);
        let decision = match &seen {
            Some(cache) => cache.evaluate(&key, &l, cfg.grace_for(&l.source), now),
            None => AlertDecision::bypassed(),
        };
        tracing::debug!(
            target: "watch",
            key = %key,
            source = %l.source,
            reason = %decision.reason,
            allow = decision.allow,
            "seen-cache decision"
        );
        report.decisions.push((key, decision.reason));
        if decision.allow {
            selected.push(l);
        } else {
            report.suppressed += 1;
        }
    }
    counter!(m::SUPPRESSED).increment(report.suppressed as u64);

    // 7) sort & limit
    profile.sort.apply(&mut selected);
    let overflow: Vec<Listing> = if selected.len() > profile.max_items {
        selected.split_off(profile.max_items)
    } else {
        Vec::new()
    };
    report.selected = selected.len();

    // 8) render & deliver
    let mut confirmed: HashSet<usize> = HashSet::new();
    if !selected.is_empty() {
        let lines: Vec<String> = selected.iter().map(|l| render_line(l, profile.render)).collect();
        let header = profile.header(selected.len());
        let chunks = pack_lines(
            Some(&header),
            &lines,
            cfg.message_budget,
            profile.render.text_format(),
        );
        let total = chunks.len();
        for (i, chunk) in chunks.iter().enumerate() {
            if i > 0 && cfg.send_pause_ms > 0 {
                tokio::time::sleep(Duration::from_millis(cfg.send_pause_ms)).await;
            }
            match ctx.notifier.send(ctx.target, chunk).await {
                Ok(()) => {
                    report.chunks_sent += 1;
                    confirmed.extend(chunk.line_indices.iter().copied());
                    tracing::info!(
                        target: "watch",
                        identity,
                        chunk = i + 1,
                        total,
                        lines = chunk.line_indices.len(),
                        chars = chunk.char_len(),
                        "chunk delivered"
                    );
                }
                Err(e) => {
                    report.chunks_failed += 1;
                    counter!(m::DELIVERY_FAILURES).increment(1);
                    tracing::warn!(
                        target: "watch",
                        identity,
                        notifier = ctx.notifier.name(),
                        chunk = i + 1,
                        total,
                        error = %e,
                        "delivery failed, remaining chunks deferred"
                    );
                    break;
                }
            }
        }
    } else {
        tracing::info!(target: "watch", identity, "nothing to send");
    }
    report.delivered = confirmed.len();
    counter!(m::DELIVERED).increment(report.delivered as u64);

    // 9) commit
    if profile.persist {
        let mut undelivered: Vec<Listing> = Vec::new();
        let mut delivered_keys: Vec<CanonicalKey> = Vec::new();
        for (i, l) in selected.into_iter().enumerate() {
            if confirmed.contains(&i) {
                delivered_keys.push(canonical_key(&l));
            } else {
                undelivered.push(l);
            }
        }
        undelivered.extend(overflow);
        report.queued = undelivered.len();

        if let Some(mut cache) = seen {
            if !delivered_keys.is_empty() {
                for k in delivered_keys {
                    cache.record_alert(k, now);
                }
                let blob = cache.to_blob(cfg.max_entries)?;
                ctx.store
                    .save(&seen_key(identity), &blob)
                    .await
                    .with_context(|| format!("saving seen-cache for {identity}"))?;
            }
        }

        if keys_of(&undelivered) != pending_keys_before {
            let blob = serde_json::to_vec_pretty(&undelivered).context("encoding carry-over queue")?;
            ctx.store
                .save(&pending_key(identity), &blob)
                .await
                .with_context(|| format!("saving carry-over queue for {identity}"))?;
        }

        for (old, det) in &detections {
            let Some(next) = det.next_marker.as_deref() else {
                continue;
            };
            if old.as_deref() == Some(next) {
                continue;
            }
            let source = det.source.as_str();
            ctx.store
                .save(&marker_key(identity, source), next.as_bytes())
                .await
                .with_context(|| format!("saving marker for {source}"))?;
            report.markers_advanced += 1;
            tracing::info!(target: "watch", identity, source, marker = next, "marker advanced");
        }
    } else {
        report.queued = selected.len() - confirmed.len() + overflow.len();
    }

    gauge!(m::LAST_RUN_TS).set(now.timestamp() as f64);
    tracing::info!(
        target: "watch",
        identity,
        detected = report.detected,
        rejected = report.rejected,
        carried_over = report.carried_over,
        deduped = report.deduped,
        window_dropped = report.window_dropped,
        filtered = report.filtered,
        suppressed = report.suppressed,
        selected = report.selected,
        delivered = report.delivered,
        queued = report.queued,
        "run finished"
    );
    Ok(report)
}
