// src/identity.rs
//! Canonical identity of a listing, shared by dedup, the seen-cache and
//! change detection.

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::ingest::types::Listing;

const TRACKING_PARAMS: [&str; 13] = [
    "gclid",
    "fbclid",
    "msclkid",
    "mc_cid",
    "mc_eid",
    "_hsenc",
    "_hsmi",
    "ref",
    "referrer",
    "gh_src",
    "trk",
    "lever-source",
    "lever-origin",
];

/// Stable identity of a listing across sources and runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalKey(String);

impl CanonicalKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for CanonicalKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CanonicalKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_tracking_param(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.starts_with("utm_") || TRACKING_PARAMS.contains(&lower.as_str())
}

fn fold_text(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Normalize a URL for identity comparison. `None` for blank input.
///
/// Scheme and host are lowercased by the parser; fragment and tracking
/// parameters are dropped, the remaining parameters sorted and trailing
/// slashes removed from the path. Input that does not parse as an absolute
/// URL is only trimmed, lowercased and stripped of trailing slashes.
pub fn normalize_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let Ok(mut url) = Url::parse(trimmed) else {
        let fallback = trimmed.to_lowercase().trim_end_matches('/').to_string();
        return (!fallback.is_empty()).then_some(fallback);
    };

    url.set_fragment(None);

    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    params.sort();
    if params.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(params.iter());
    }

    let path = url.path().trim_end_matches('/').to_string();
    url.set_path(&path);

    // `Url` always renders a root path as "/", so strip it from the text too.
    let mut out = url.to_string();
    if url.query().is_none() {
        while out.ends_with('/') {
            out.pop();
        }
    }
    Some(out)
}

/// Identity priority: normalized url, then `id:<id>`, then `company:title`.
pub fn canonical_key(listing: &Listing) -> CanonicalKey {
    if let Some(u) = listing.url.as_deref().and_then(normalize_url) {
        return CanonicalKey(u);
    }
    if let Some(id) = listing.id.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        return CanonicalKey(format!("id:{id}"));
    }
    CanonicalKey(format!(
        "{}:{}",
        fold_text(&listing.company),
        fold_text(&listing.title)
    ))
}
