// src/config/watch.rs
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::change_detector::{BackfillDirective, DEFAULT_HISTORY_DEPTH};
use crate::classify::{Category, CategoryPolicy, GraduateFilter};
use crate::format::{DEFAULT_BUDGET, MIN_BUDGET};
use crate::ingest::config::{load_sources_default, parse_inline_sources};
use crate::seen_cache::{DEFAULT_GRACE_SECS, DEFAULT_MAX_ENTRIES};
use crate::window::TimeFilter;

const ENV_PATH: &str = "WATCH_CONFIG_PATH";
const DEFAULT_PATH: &str = "config/watch.toml";

fn default_sources() -> Vec<String> {
    vec![
        "SimplifyJobs/Summer2026-Internships".to_string(),
        "vanshb03/Summer2026-Internships".to_string(),
    ]
}
fn default_listings_path() -> String {
    ".github/scripts/listings.json".to_string()
}
fn default_watch_paths() -> Vec<String> {
    vec!["listings.json".to_string()]
}
fn default_state_dir() -> PathBuf {
    PathBuf::from("state")
}
fn default_ttl_days() -> u32 {
    14
}
fn default_grace() -> i64 {
    DEFAULT_GRACE_SECS
}
fn default_budget() -> usize {
    DEFAULT_BUDGET
}
fn default_history_depth() -> usize {
    DEFAULT_HISTORY_DEPTH
}
fn default_max_entries() -> usize {
    DEFAULT_MAX_ENTRIES
}
fn default_send_pause_ms() -> u64 {
    250
}

fn de_categories<'de, D>(d: D) -> std::result::Result<Vec<Category>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Vec<String> = Vec::deserialize(d)?;
    raw.iter()
        .map(|s| s.parse::<Category>().map_err(serde::de::Error::custom))
        .collect()
}

/// Settings of one notifying workflow (`watch` or `digest`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSettings {
    /// Empty = every category.
    #[serde(default, deserialize_with = "de_categories")]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub exclude_other: bool,
    pub max_items: usize,
    pub window_hours: f64,
}

impl WorkflowSettings {
    pub fn watch_default() -> Self {
        Self {
            categories: vec![Category::SoftwareEngineering, Category::DataScienceAiMl],
            exclude_other: false,
            max_items: 10,
            window_hours: 24.0,
        }
    }

    pub fn digest_default() -> Self {
        Self {
            categories: Vec::new(),
            exclude_other: true,
            max_items: 50,
            window_hours: 4.0,
        }
    }

    pub fn policy(&self) -> CategoryPolicy {
        let p = CategoryPolicy::only(self.categories.iter().copied());
        if self.exclude_other {
            p.excluding_other()
        } else {
            p
        }
    }
}

fn default_watch_settings() -> WorkflowSettings {
    WorkflowSettings::watch_default()
}
fn default_digest_settings() -> WorkflowSettings {
    WorkflowSettings::digest_default()
}

/// Runtime configuration: TOML file, then environment overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Source identifiers (`owner/repo`), in dedup priority order.
    #[serde(default = "default_sources")]
    pub sources: Vec<String>,
    #[serde(default = "default_listings_path")]
    pub listings_path: String,
    #[serde(default = "default_watch_paths")]
    pub watch_paths: Vec<String>,
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    #[serde(default = "default_ttl_days")]
    pub seen_ttl_days: u32,
    #[serde(default = "default_grace")]
    pub reopen_grace_seconds: i64,
    /// Per-source grace, keyed by source identifier.
    #[serde(default)]
    pub grace_overrides: BTreeMap<String, i64>,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// Overrides the per-workflow window when set.
    #[serde(default)]
    pub window_hours: Option<f64>,
    /// Wins over everything else.
    #[serde(default)]
    pub force_window_hours: Option<f64>,
    /// Overrides the per-workflow item limit when set.
    #[serde(default)]
    pub max_items: Option<usize>,

    #[serde(default)]
    pub graduate_filter: GraduateFilter,
    #[serde(default = "default_budget")]
    pub message_budget: usize,
    #[serde(default = "default_history_depth")]
    pub history_depth: usize,
    #[serde(default = "default_send_pause_ms")]
    pub send_pause_ms: u64,
    /// Prepended to every message header.
    #[serde(default)]
    pub message_prefix: String,

    #[serde(default = "default_watch_settings")]
    pub watch: WorkflowSettings,
    #[serde(default = "default_digest_settings")]
    pub digest: WorkflowSettings,

    // Run-scoped, environment only.
    #[serde(skip)]
    pub directive: BackfillDirective,
    #[serde(skip)]
    pub dry_run: bool,
    #[serde(skip)]
    pub telegram_chat_id: Option<String>,
    #[serde(skip)]
    pub gh_token: Option<String>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            sources: default_sources(),
            listings_path: default_listings_path(),
            watch_paths: default_watch_paths(),
            state_dir: default_state_dir(),
            seen_ttl_days: default_ttl_days(),
            reopen_grace_seconds: default_grace(),
            grace_overrides: BTreeMap::new(),
            max_entries: default_max_entries(),
            window_hours: None,
            force_window_hours: None,
            max_items: None,
            graduate_filter: GraduateFilter::default(),
            message_budget: default_budget(),
            history_depth: default_history_depth(),
            send_pause_ms: default_send_pause_ms(),
            message_prefix: String::new(),
            watch: WorkflowSettings::watch_default(),
            digest: WorkflowSettings::digest_default(),
            directive: BackfillDirective::None,
            dry_run: false,
            telegram_chat_id: None,
            gh_token: None,
        }
    }
}

fn parse_flag(v: &str) -> bool {
    matches!(
        v.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_num<T: std::str::FromStr>(key: &str, v: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    v.trim()
        .parse::<T>()
        .map_err(|e| anyhow!("{key}={v:?}: {e}"))
}

/// Category list from env: JSON array, else `;`/`|` separated, else commas.
pub fn parse_category_list(raw: &str) -> Result<Vec<Category>> {
    let s = raw.trim();
    let items: Vec<String> = if s.starts_with('[') {
        serde_json::from_str(s).with_context(|| format!("category list {s:?}"))?
    } else if s.contains(';') || s.contains('|') {
        s.split([';', '|']).map(str::to_string).collect()
    } else {
        s.split(',').map(str::to_string).collect()
    };
    items
        .iter()
        .map(|i| i.trim())
        .filter(|i| !i.is_empty())
        .map(str::parse::<Category>)
        .collect()
}

impl WatchConfig {
    /// File from `$WATCH_CONFIG_PATH`, else `config/watch.toml`, else
    /// defaults; then the source list file; then the process environment.
    pub fn load() -> Result<Self> {
        let mut cfg = match std::env::var(ENV_PATH) {
            Ok(p) => {
                let pb = PathBuf::from(&p);
                if !pb.exists() {
                    bail!("{ENV_PATH} points to non-existent path {p}");
                }
                Self::load_from_file(&pb)?
            }
            Err(_) => {
                let pb = PathBuf::from(DEFAULT_PATH);
                if pb.exists() {
                    Self::load_from_file(&pb)?
                } else {
                    Self::default()
                }
            }
        };

        let listed = load_sources_default()?;
        if !listed.is_empty() {
            cfg.sources = listed;
        }

        cfg.apply_env(|k| std::env::var(k).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let cfg: WatchConfig =
            toml::from_str(&data).with_context(|| format!("parsing config {}", path.display()))?;
        Ok(cfg)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env<F>(&mut self, get: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |k: &str| get(k).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("TARGET_SOURCES").or_else(|| var("TARGET_REPOS")) {
            self.sources = parse_inline_sources(&v);
        }
        if let Some(v) = var("LISTINGS_PATH") {
            self.listings_path = v.trim().to_string();
        }
        if let Some(v) = var("WATCH_PATHS") {
            self.watch_paths = parse_inline_sources(&v);
        }
        if let Some(v) = var("STATE_DIR") {
            self.state_dir = PathBuf::from(v.trim());
        }
        if let Some(v) = var("WINDOW_HOURS") {
            self.window_hours = Some(parse_num("WINDOW_HOURS", &v)?);
        }
        if let Some(v) = var("FORCE_WINDOW_HOURS") {
            self.force_window_hours = Some(parse_num("FORCE_WINDOW_HOURS", &v)?);
        }
        if let Some(v) = var("SEEN_TTL_DAYS") {
            self.seen_ttl_days = parse_num("SEEN_TTL_DAYS", &v)?;
        }
        if let Some(v) = var("REOPEN_GRACE_SECONDS") {
            self.reopen_grace_seconds = parse_num("REOPEN_GRACE_SECONDS", &v)?;
        }
        if let Some(v) = var("DIGEST_CATEGORIES") {
            self.digest.categories = parse_category_list(&v)?;
        }
        if let Some(v) = var("ALERT_CATEGORIES") {
            self.watch.categories = parse_category_list(&v)?;
        }
        if let Some(v) = var("GRADUATE_FILTER") {
            self.graduate_filter = v.parse()?;
        }
        if let Some(v) = var("MESSAGE_BUDGET") {
            self.message_budget = parse_num("MESSAGE_BUDGET", &v)?;
        }
        if let Some(v) = var("MAX_ITEMS").or_else(|| var("COUNT")) {
            self.max_items = Some(parse_num("MAX_ITEMS", &v)?);
        }
        if let Some(v) = var("HISTORY_DEPTH") {
            self.history_depth = parse_num("HISTORY_DEPTH", &v)?;
        }
        if let Some(v) = var("MESSAGE_PREFIX") {
            self.message_prefix = v;
        }

        let reset = var("RESET_BASELINE")
            .or_else(|| var("RESET_LAST_SEEN"))
            .is_some_and(|v| parse_flag(&v));
        let back_one = var("BACK_ONE").is_some_and(|v| parse_flag(&v));
        self.directive = match (reset, back_one) {
            (true, true) => {
                tracing::warn!("both RESET_BASELINE and BACK_ONE set, using RESET_BASELINE");
                BackfillDirective::ResetBaseline
            }
            (true, false) => BackfillDirective::ResetBaseline,
            (false, true) => BackfillDirective::BackOne,
            (false, false) => BackfillDirective::None,
        };

        self.dry_run = var("DRY_RUN").is_some_and(|v| parse_flag(&v));
        self.telegram_chat_id = var("TELEGRAM_CHAT_ID").map(|v| v.trim().to_string());
        self.gh_token = var("GH_TOKEN").or_else(|| var("GITHUB_TOKEN"));
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            bail!("no sources configured");
        }
        if self.seen_ttl_days == 0 {
            bail!("seen_ttl_days must be positive");
        }
        if self.message_budget < MIN_BUDGET {
            bail!("message_budget must be at least {MIN_BUDGET}, got {}", self.message_budget);
        }
        if self.history_depth == 0 {
            bail!("history_depth must be positive");
        }
        let ttl_secs = i64::from(self.seen_ttl_days) * 86_400;
        let graces = std::iter::once(("default", self.reopen_grace_seconds))
            .chain(self.grace_overrides.iter().map(|(k, v)| (k.as_str(), *v)));
        for (source, secs) in graces {
            if !(0..=ttl_secs).contains(&secs) {
                bail!("reopen grace for {source} must be between 0 and the seen TTL ({ttl_secs}s), got {secs}");
            }
        }
        for h in [self.window_hours, self.force_window_hours].into_iter().flatten() {
            if !h.is_finite() || h < 0.0 {
                bail!("window hours must be a non-negative number, got {h}");
            }
        }
        if self.listings_path.trim().is_empty() {
            bail!("listings_path is empty");
        }
        Ok(())
    }

    /// Time filter for a workflow whose own default window is `base_hours`.
    pub fn time_filter(&self, base_hours: f64) -> TimeFilter {
        TimeFilter::hours_with_override(self.window_hours.unwrap_or(base_hours), self.force_window_hours)
    }

    pub fn item_limit(&self, base: usize) -> usize {
        self.max_items.unwrap_or(base)
    }

    /// Reopen grace for one source (case-insensitive lookup of overrides).
    pub fn grace_for(&self, source: &str) -> chrono::Duration {
        let secs = self
            .grace_overrides
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(source))
            .map(|(_, v)| *v)
            .unwrap_or(self.reopen_grace_seconds);
        let ttl_secs = i64::from(self.seen_ttl_days) * 86_400;
        chrono::Duration::try_seconds(secs.clamp(0, ttl_secs)).unwrap_or_else(chrono::Duration::zero)
    }

    /// Destination chat for deliveries.
    pub fn telegram_target(&self) -> Result<&str> {
        self.telegram_chat_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow!("TELEGRAM_CHAT_ID is not set"))
    }
}
