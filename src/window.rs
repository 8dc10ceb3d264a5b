//! # Time Window
//! Recency filter on listing timestamps.
//!
//! The effective timestamp of a listing is `date_posted`, else
//! `date_updated`; listings with neither are always dropped. The boundary is
//! inclusive: a listing exactly `hours` old is kept.

use chrono::{DateTime, Duration, Utc};
use std::fmt;

use crate::ingest::types::Listing;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeFilter {
    /// `now - effective <= hours`.
    Hours(f64),
    /// Effective UTC calendar date equals today's UTC date.
    Today,
    /// Any listing that carries a timestamp.
    Any,
}

impl TimeFilter {
    /// Window in hours, with `force` taking precedence when set.
    pub fn hours_with_override(hours: f64, force: Option<f64>) -> Self {
        TimeFilter::Hours(force.unwrap_or(hours))
    }

    fn span(hours: f64) -> Duration {
        Duration::milliseconds((hours.max(0.0) * 3_600_000.0).round() as i64)
    }

    pub fn admits(&self, listing: &Listing, now: DateTime<Utc>) -> bool {
        let Some(ts) = listing.effective_timestamp() else {
            return false;
        };
        match *self {
            TimeFilter::Hours(h) => now.signed_duration_since(ts) <= Self::span(h),
            TimeFilter::Today => ts.date_naive() == now.date_naive(),
            TimeFilter::Any => true,
        }
    }
}

impl fmt::Display for TimeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeFilter::Hours(h) => write!(f, "last {h}h"),
            TimeFilter::Today => f.write_str("today (UTC)"),
            TimeFilter::Any => f.write_str("any time"),
        }
    }
}

/// Split listings by the filter. Returns kept listings and the dropped count.
pub fn apply_window(
    listings: Vec<Listing>,
    filter: TimeFilter,
    now: DateTime<Utc>,
) -> (Vec<Listing>, usize) {
    let before = listings.len();
    let kept: Vec<Listing> = listings
        .into_iter()
        .filter(|l| filter.admits(l, now))
        .collect();
    let dropped = before - kept.len();
    (kept, dropped)
}
