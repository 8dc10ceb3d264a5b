// src/change_detector.rs
//! Per-source candidate selection.
//!
//! Commit mode walks the source history since the stored revision marker and
//! emits only records *added* by each commit (key absent at the parent).
//! Snapshot mode emits the whole current record set and leaves the marker
//! alone. Provider errors abort detection; bad records are only counted.

use anyhow::{Context, Result};
use std::collections::HashSet;

use crate::identity::{canonical_key, CanonicalKey};
use crate::ingest::normalize_batch;
use crate::ingest::types::{Commit, Listing, RejectReason, SourceProvider};

pub const DEFAULT_HISTORY_DEPTH: usize = 20;

/// Operator override of the stored marker for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BackfillDirective {
    #[default]
    None,
    /// Ignore the marker and treat the whole fetched history as new.
    ResetBaseline,
    /// Step the marker back to its parent, re-processing the last commit.
    BackOne,
}

#[derive(Debug, Clone)]
pub struct CommitModeOptions {
    /// Commits touching none of these are skipped. Empty = every commit counts.
    pub watch_paths: Vec<String>,
    pub history_depth: usize,
    pub directive: BackfillDirective,
}

impl Default for CommitModeOptions {
    fn default() -> Self {
        Self {
            watch_paths: Vec::new(),
            history_depth: DEFAULT_HISTORY_DEPTH,
            directive: BackfillDirective::None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Detection {
    pub source: String,
    pub candidates: Vec<Listing>,
    pub rejected: Vec<RejectReason>,
    /// Marker to persist after the run; `None` leaves the stored one as is.
    pub next_marker: Option<String>,
    pub commits_processed: usize,
    /// First run: marker established, nothing emitted.
    pub baseline: bool,
}

impl Detection {
    fn empty(source: &str) -> Self {
        Self {
            source: source.to_string(),
            ..Default::default()
        }
    }
}

fn touches_watched(paths: &[String], watched: &[String]) -> bool {
    paths.iter().any(|p| {
        watched
            .iter()
            .any(|w| p == w || p.ends_with(&format!("/{}", w.trim_start_matches('/'))))
    })
}

/// Commits to process, oldest first.
fn select_commits<'a>(
    source: &str,
    commits: &'a [Commit],
    marker: Option<&str>,
) -> Vec<&'a Commit> {
    let mut newer: Vec<&Commit> = match marker {
        None => commits.iter().collect(),
        Some(m) => {
            let newer: Vec<&Commit> = commits.iter().take_while(|c| c.id != m).collect();
            if newer.len() == commits.len() {
                tracing::warn!(
                    target: "watch",
                    source,
                    marker = m,
                    window = commits.len(),
                    "marker not in fetched history, processing whole window"
                );
            }
            newer
        }
    };
    newer.reverse();
    newer
}

async fn keys_at(provider: &dyn SourceProvider, revision: Option<&str>) -> Result<HashSet<CanonicalKey>> {
    let Some(rev) = revision else {
        return Ok(HashSet::new());
    };
    let records = provider
        .records_at(rev)
        .await
        .with_context(|| format!("{}: records at {rev}", provider.name()))?
        .unwrap_or_default();
    Ok(normalize_batch(&records, provider.name())
        .listings
        .iter()
        .map(canonical_key)
        .collect())
}

/// Walk new commits of one source and collect added listings.
pub async fn detect_commits(
    provider: &dyn SourceProvider,
    marker: Option<&str>,
    opts: &CommitModeOptions,
) -> Result<Detection> {
    let name = provider.name().to_string();
    let mut det = Detection::empty(&name);

    let commits = provider
        .recent_commits(opts.history_depth.max(1))
        .await
        .with_context(|| format!("{name}: listing commits"))?;
    let Some(newest) = commits.first().map(|c| c.id.clone()) else {
        tracing::info!(target: "watch", source = %name, "no commits");
        det.next_marker = marker.map(str::to_string);
        return Ok(det);
    };

    let to_process: Vec<&Commit> = match (opts.directive, marker) {
        (BackfillDirective::ResetBaseline, _) => {
            tracing::info!(target: "watch", source = %name, window = commits.len(), "reset baseline, backfilling window");
            select_commits(&name, &commits, None)
        }
        (BackfillDirective::BackOne, Some(m)) => {
            let parent = provider
                .parent_of(m)
                .await
                .with_context(|| format!("{name}: parent of {m}"))?;
            tracing::info!(target: "watch", source = %name, from = m, to = ?parent, "stepping marker back one commit");
            select_commits(&name, &commits, parent.as_deref())
        }
        (BackfillDirective::BackOne, None) => commits.iter().take(1).collect(),
        (BackfillDirective::None, None) => {
            tracing::info!(target: "watch", source = %name, marker = %newest, "first run, baseline established");
            det.baseline = true;
            det.next_marker = Some(newest);
            return Ok(det);
        }
        (BackfillDirective::None, Some(m)) => select_commits(&name, &commits, Some(m)),
    };

    let mut emitted: HashSet<CanonicalKey> = HashSet::new();
    for commit in to_process {
        if !opts.watch_paths.is_empty() {
            let paths = provider
                .changed_paths(&commit.id)
                .await
                .with_context(|| format!("{name}: files of {}", commit.id))?;
            if !touches_watched(&paths, &opts.watch_paths) {
                tracing::debug!(target: "watch", source = %name, commit = %commit.id, "no watched path touched");
                continue;
            }
        }
        det.commits_processed += 1;

        let Some(records) = provider
            .records_at(&commit.id)
            .await
            .with_context(|| format!("{name}: records at {}", commit.id))?
        else {
            tracing::debug!(target: "watch", source = %name, commit = %commit.id, "listings file absent");
            continue;
        };
        let parent_keys = keys_at(provider, commit.parent.as_deref()).await?;

        let batch = normalize_batch(&records, &name);
        det.rejected.extend(batch.rejected);
        let mut added = 0usize;
        for l in batch.listings {
            let key = canonical_key(&l);
            if parent_keys.contains(&key) || !emitted.insert(key) {
                continue;
            }
            added += 1;
            det.candidates.push(l);
        }
        tracing::debug!(target: "watch", source = %name, commit = %commit.id, added, "commit processed");
    }

    tracing::info!(
        target: "watch",
        source = %name,
        commits = det.commits_processed,
        candidates = det.candidates.len(),
        rejected = det.rejected.len(),
        "commit detection done"
    );
    det.next_marker = Some(newest);
    Ok(det)
}

/// Emit the whole current record set of one source.
pub async fn detect_snapshot(provider: &dyn SourceProvider) -> Result<Detection> {
    let name = provider.name().to_string();
    let records = provider
        .snapshot()
        .await
        .with_context(|| format!("{name}: fetching snapshot"))?;
    let batch = normalize_batch(&records, &name);
    tracing::info!(
        target: "watch",
        source = %name,
        listings = batch.listings.len(),
        rejected = batch.rejected.len(),
        "snapshot fetched"
    );
    Ok(Detection {
        source: name,
        candidates: batch.listings,
        rejected: batch.rejected,
        ..Default::default()
    })
}
