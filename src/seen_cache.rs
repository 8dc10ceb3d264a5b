// src/seen_cache.rs
//! Time-boxed memory of delivered listings.
//!
//! - Unseen keys are allowed.
//! - A seen key is allowed again when the listing was modified after
//!   `last_alert + grace` (reopen) or when its entry outlived the TTL.
//! - Everything else is suppressed.
//! - `evaluate` never mutates; `record_alert` is called only for keys whose
//!   delivery was confirmed.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

use crate::identity::CanonicalKey;
use crate::ingest::types::Listing;

pub const DEFAULT_MAX_ENTRIES: usize = 200_000;
pub const DEFAULT_GRACE_SECS: i64 = 3600;
const METADATA_KEY: &str = "_metadata";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertReason {
    New,
    Reopen,
    TtlExpired,
    Suppressed,
    /// Seen-cache not consulted (diagnostic workflows).
    Bypassed,
}

impl AlertReason {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertReason::New => "new",
            AlertReason::Reopen => "reopen",
            AlertReason::TtlExpired => "ttl_expired",
            AlertReason::Suppressed => "suppressed",
            AlertReason::Bypassed => "bypassed",
        }
    }
}

impl fmt::Display for AlertReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertDecision {
    pub allow: bool,
    pub reason: AlertReason,
}

impl AlertDecision {
    fn allow(reason: AlertReason) -> Self {
        Self { allow: true, reason }
    }

    fn suppress() -> Self {
        Self {
            allow: false,
            reason: AlertReason::Suppressed,
        }
    }

    pub fn bypassed() -> Self {
        Self::allow(AlertReason::Bypassed)
    }
}

#[derive(Debug, Clone)]
pub struct SeenCache {
    entries: HashMap<CanonicalKey, DateTime<Utc>>,
    ttl_days: u32,
    created: DateTime<Utc>,
}

fn epoch_of(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
        }
        _ => None,
    }
}

impl SeenCache {
    pub fn empty(ttl_days: u32, now: DateTime<Utc>) -> Self {
        Self {
            entries: HashMap::new(),
            ttl_days,
            created: now,
        }
    }

    /// Parse a persisted blob and purge entries older than the TTL.
    ///
    /// `None` (nothing stored yet) gives an empty cache. A blob that is not a
    /// JSON object is an error: the caller aborts rather than re-alerting
    /// everything.
    pub fn load(blob: Option<&[u8]>, ttl_days: u32, now: DateTime<Utc>) -> Result<Self> {
        let mut cache = Self::empty(ttl_days, now);
        let Some(bytes) = blob else {
            return Ok(cache);
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(cache);
        }
        let doc: Map<String, Value> =
            serde_json::from_slice(bytes).context("seen-cache blob is not a JSON object")?;

        let ttl = cache.ttl();
        let mut purged = 0usize;
        for (k, v) in doc {
            if k == METADATA_KEY {
                if let Some(ts) = v
                    .get("created")
                    .and_then(epoch_of)
                    .and_then(|s| Utc.timestamp_opt(s, 0).single())
                {
                    cache.created = ts;
                }
                continue;
            }
            let Some(ts) = epoch_of(&v).and_then(|s| Utc.timestamp_opt(s, 0).single()) else {
                tracing::debug!(target: "seen_cache", key = %k, "ignoring entry with unreadable timestamp");
                continue;
            };
            if now.signed_duration_since(ts) > ttl {
                purged += 1;
                continue;
            }
            cache.entries.insert(CanonicalKey::from(k), ts);
        }
        tracing::debug!(target: "seen_cache", kept = cache.entries.len(), purged, "seen-cache loaded");
        Ok(cache)
    }

    pub fn ttl(&self) -> Duration {
        Duration::days(i64::from(self.ttl_days))
    }

    pub fn ttl_days(&self) -> u32 {
        self.ttl_days
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last_alert(&self, key: &CanonicalKey) -> Option<DateTime<Utc>> {
        self.entries.get(key).copied()
    }

    /// Decide whether `listing` (identified by `key`) may be alerted at `now`.
    pub fn evaluate(
        &self,
        key: &CanonicalKey,
        listing: &Listing,
        grace: Duration,
        now: DateTime<Utc>,
    ) -> AlertDecision {
        let Some(last) = self.entries.get(key).copied() else {
            return AlertDecision::allow(AlertReason::New);
        };
        if let Some(modified) = listing.last_modified() {
            // an edge past the calendar's end can never be crossed
            if last.checked_add_signed(grace).is_some_and(|edge| modified > edge) {
                return AlertDecision::allow(AlertReason::Reopen);
            }
        }
        if now.signed_duration_since(last) > self.ttl() {
            return AlertDecision::allow(AlertReason::TtlExpired);
        }
        AlertDecision::suppress()
    }

    /// Create or refresh the entry of a delivered key.
    pub fn record_alert(&mut self, key: CanonicalKey, now: DateTime<Utc>) {
        self.entries.insert(key, now);
    }

    /// Serialize, keeping only the `max_entries` most recently alerted keys.
    pub fn to_blob(&self, max_entries: usize) -> Result<Vec<u8>> {
        let mut items: Vec<(&CanonicalKey, &DateTime<Utc>)> = self.entries.iter().collect();
        if items.len() > max_entries {
            items.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
            items.truncate(max_entries);
        }

        let mut doc = Map::new();
        doc.insert(
            METADATA_KEY.to_string(),
            serde_json::json!({
                "created": self.created.timestamp(),
                "ttl_days": self.ttl_days,
            }),
        );
        for (k, ts) in items {
            doc.insert(k.as_str().to_string(), Value::from(ts.timestamp()));
        }
        serde_json::to_vec_pretty(&Value::Object(doc)).context("serializing seen-cache")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Category;

    fn listing(updated: Option<DateTime<Utc>>) -> Listing {
        Listing {
            id: None,
            url: Some("https://acme.example/jobs/1".into()),
            company: "Acme".into(),
            title: "Intern".into(),
            category_raw: None,
            category: Category::Other,
            requires_graduate_degree: false,
            locations: vec![],
            season: None,
            date_posted: None,
            date_updated: updated,
            source: "o/r".into(),
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 6, 9, 0, 0).unwrap()
    }

    #[test]
    fn grace_suppresses_then_reopen_allows() {
        let key = CanonicalKey::from("k");
        let mut c = SeenCache::empty(14, t0());
        c.record_alert(key.clone(), t0());
        let grace = Duration::seconds(DEFAULT_GRACE_SECS);

        let inside = listing(Some(t0() + Duration::minutes(30)));
        assert_eq!(c.evaluate(&key, &inside, grace, t0() + Duration::hours(2)).reason, AlertReason::Suppressed);

        let after = listing(Some(t0() + Duration::hours(3)));
        let d = c.evaluate(&key, &after, grace, t0() + Duration::hours(4));
        assert!(d.allow);
        assert_eq!(d.reason, AlertReason::Reopen);
    }

    #[test]
    fn grace_past_the_calendar_end_never_reopens() {
        let key = CanonicalKey::from("k");
        let end = DateTime::<Utc>::MAX_UTC;
        let mut c = SeenCache::empty(14, end);
        c.record_alert(key.clone(), end);
        let d = c.evaluate(&key, &listing(Some(end)), Duration::days(1), end);
        assert!(!d.allow);
        assert_eq!(d.reason, AlertReason::Suppressed);
    }

    #[test]
    fn load_accepts_mixed_value_types_and_purges() {
        let now = t0();
        let fresh = now.timestamp() - 3600;
        let stale = now.timestamp() - 20 * 86_400;
        let blob = format!(
            r#"{{"_metadata": {{"created": 1, "ttl_days": 14}}, "a": {fresh}, "b": {fresh}.5, "c": "{fresh}", "d": {stale}, "e": true}}"#
        );
        let c = SeenCache::load(Some(blob.as_bytes()), 14, now).unwrap();
        assert_eq!(c.len(), 3);
        assert!(c.last_alert(&"d".into()).is_none());
    }

    #[test]
    fn blob_is_capped_to_newest() {
        let mut c = SeenCache::empty(14, t0());
        for i in 0..5 {
            c.record_alert(format!("k{i}").into(), t0() + Duration::minutes(i));
        }
        let blob = c.to_blob(2).unwrap();
        let back = SeenCache::load(Some(&blob), 14, t0() + Duration::hours(1)).unwrap();
        assert_eq!(back.len(), 2);
        assert!(back.last_alert(&"k4".into()).is_some());
        assert!(back.last_alert(&"k3".into()).is_some());
    }

    #[test]
    fn garbage_blob_is_an_error() {
        assert!(SeenCache::load(Some(b"[1,2]"), 14, t0()).is_err());
        assert!(SeenCache::load(Some(b"  "), 14, t0()).unwrap().is_empty());
    }
}
