//! # Workflow profiles
//!
//! Every entry point (`watch`, `digest` and the diagnostics) is one profile
//! feeding the same pipeline. A profile fixes the state identity, how
//! candidates are detected, how they are filtered and rendered, and whether
//! the run may write state.

use anyhow::{anyhow, bail, Result};
use std::fmt;

use crate::classify::{CategoryPolicy, GraduateFilter};
use crate::config::WatchConfig;
use crate::format::{RenderMode, TextFormat};
use crate::ingest::types::Listing;
use crate::window::TimeFilter;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WorkflowKind {
    /// Commit-mode fast alerts.
    Watch,
    /// Snapshot-mode periodic digest.
    Digest,
    /// Diagnostic: newest N listings, no time bound.
    Recent(usize),
    /// Diagnostic: listings dated today (UTC).
    Today,
    /// Diagnostic: digest over an explicit window in hours.
    Window(f64),
}

impl WorkflowKind {
    /// Parse command-line words: `watch`, `digest`, `recent [N]`, `today`,
    /// `window <hours>`.
    pub fn parse(args: &[String]) -> Result<Self> {
        let mut it = args.iter().map(|s| s.trim());
        let cmd = it.next().unwrap_or("watch").to_ascii_lowercase();
        let arg = it.next();
        let kind = match cmd.as_str() {
            "watch" => WorkflowKind::Watch,
            "digest" => WorkflowKind::Digest,
            "recent" => {
                let n = match arg {
                    Some(a) => a.parse::<usize>().map_err(|e| anyhow!("recent {a:?}: {e}"))?,
                    None => 10,
                };
                WorkflowKind::Recent(n.max(1))
            }
            "today" => WorkflowKind::Today,
            "window" => {
                let a = arg.ok_or_else(|| anyhow!("usage: window <hours>"))?;
                let h = a.parse::<f64>().map_err(|e| anyhow!("window {a:?}: {e}"))?;
                if !h.is_finite() || h <= 0.0 {
                    bail!("window hours must be positive, got {h}");
                }
                WorkflowKind::Window(h)
            }
            other => bail!("unknown workflow {other:?} (watch | digest | recent N | today | window H)"),
        };
        Ok(kind)
    }

    /// State identity; diagnostics never share state with real workflows.
    pub fn identity(&self) -> &'static str {
        match self {
            WorkflowKind::Watch => "watch",
            WorkflowKind::Digest => "digest",
            WorkflowKind::Recent(_) => "diag-recent",
            WorkflowKind::Today => "diag-today",
            WorkflowKind::Window(_) => "diag-window",
        }
    }
}

impl fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowKind::Watch => f.write_str("watch"),
            WorkflowKind::Digest => f.write_str("digest"),
            WorkflowKind::Recent(n) => write!(f, "recent {n}"),
            WorkflowKind::Today => f.write_str("today"),
            WorkflowKind::Window(h) => write!(f, "window {h}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectMode {
    Commits,
    Snapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeenPolicy {
    Enforce,
    Bypass,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Company, then title (case-insensitive).
    Company,
    /// Effective timestamp, newest first.
    NewestFirst,
}

impl SortOrder {
    pub fn apply(self, listings: &mut [Listing]) {
        match self {
            SortOrder::Company => listings.sort_by(|a, b| {
                a.company
                    .to_lowercase()
                    .cmp(&b.company.to_lowercase())
                    .then_with(|| a.title.to_lowercase().cmp(&b.title.to_lowercase()))
            }),
            SortOrder::NewestFirst => {
                listings.sort_by(|a, b| b.effective_timestamp().cmp(&a.effective_timestamp()))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkflowProfile {
    pub kind: WorkflowKind,
    pub identity: String,
    pub detect: DetectMode,
    pub render: RenderMode,
    pub time_filter: TimeFilter,
    pub seen: SeenPolicy,
    pub categories: CategoryPolicy,
    pub graduate: GraduateFilter,
    /// Write seen entries, markers and the carry-over queue.
    pub persist: bool,
    pub sort: SortOrder,
    pub max_items: usize,
    pub header_prefix: String,
}

impl WorkflowProfile {
    pub fn for_kind(kind: WorkflowKind, cfg: &WatchConfig) -> Self {
        let base = WorkflowProfile {
            kind,
            identity: kind.identity().to_string(),
            detect: DetectMode::Snapshot,
            render: RenderMode::Condensed,
            time_filter: TimeFilter::Any,
            seen: SeenPolicy::Bypass,
            categories: CategoryPolicy::allow_all(),
            graduate: cfg.graduate_filter,
            persist: false,
            sort: SortOrder::NewestFirst,
            max_items: cfg.max_items.unwrap_or(usize::MAX),
            header_prefix: cfg.message_prefix.clone(),
        };
        match kind {
            WorkflowKind::Watch => WorkflowProfile {
                detect: DetectMode::Commits,
                time_filter: cfg.time_filter(cfg.watch.window_hours),
                seen: SeenPolicy::Enforce,
                categories: cfg.watch.policy(),
                persist: true,
                sort: SortOrder::Company,
                max_items: cfg.item_limit(cfg.watch.max_items),
                ..base
            },
            WorkflowKind::Digest => WorkflowProfile {
                render: RenderMode::Verbose,
                time_filter: cfg.time_filter(cfg.digest.window_hours),
                seen: SeenPolicy::Enforce,
                categories: cfg.digest.policy(),
                persist: true,
                max_items: cfg.item_limit(cfg.digest.max_items),
                ..base
            },
            WorkflowKind::Recent(n) => WorkflowProfile {
                max_items: n,
                ..base
            },
            WorkflowKind::Today => WorkflowProfile {
                time_filter: TimeFilter::Today,
                ..base
            },
            WorkflowKind::Window(h) => WorkflowProfile {
                render: RenderMode::Verbose,
                time_filter: TimeFilter::Hours(h),
                categories: cfg.digest.policy(),
                max_items: cfg.item_limit(cfg.digest.max_items),
                ..base
            },
        }
    }

    /// Header of the first message for `count` listings.
    pub fn header(&self, count: usize) -> String {
        let body = match self.kind {
            WorkflowKind::Watch => format!("🔔 New internships detected ({count})"),
            WorkflowKind::Digest => format!("📈 Job Digest ({}) - {count} listings", self.time_filter),
            WorkflowKind::Recent(_) => format!("Most recent listings: {count}"),
            WorkflowKind::Today => format!("New listings today: {count}"),
            WorkflowKind::Window(h) => format!("New internships detected in last {h}h ({count})"),
        };
        let prefix = self.header_prefix.trim();
        let full = if prefix.is_empty() {
            body
        } else {
            format!("{prefix} {body}")
        };
        match self.render.text_format() {
            TextFormat::Html => html_escape::encode_text(&full).into_owned(),
            TextFormat::Plain => full,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn parse_commands() {
        assert_eq!(WorkflowKind::parse(&[]).unwrap(), WorkflowKind::Watch);
        assert_eq!(WorkflowKind::parse(&args("recent 5")).unwrap(), WorkflowKind::Recent(5));
        assert_eq!(WorkflowKind::parse(&args("window 8")).unwrap(), WorkflowKind::Window(8.0));
        assert!(WorkflowKind::parse(&args("window")).is_err());
        assert!(WorkflowKind::parse(&args("explode")).is_err());
    }

    #[test]
    fn diagnostics_never_persist() {
        let cfg = WatchConfig::default();
        for kind in [WorkflowKind::Recent(3), WorkflowKind::Today, WorkflowKind::Window(6.0)] {
            let p = WorkflowProfile::for_kind(kind, &cfg);
            assert!(!p.persist);
            assert_eq!(p.seen, SeenPolicy::Bypass);
            assert_ne!(p.identity, "watch");
            assert_ne!(p.identity, "digest");
        }
        let w = WorkflowProfile::for_kind(WorkflowKind::Watch, &cfg);
        assert!(w.persist);
        assert_eq!(w.detect, DetectMode::Commits);
        assert_eq!(w.max_items, 10);
    }
}
