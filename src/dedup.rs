// src/dedup.rs
use std::collections::HashSet;

use crate::identity::{canonical_key, CanonicalKey};
use crate::ingest::types::Listing;

#[derive(Debug, Default, Clone)]
pub struct DedupOutcome {
    pub kept: Vec<Listing>,
    /// Keys of the dropped duplicates, in encounter order.
    pub dropped: Vec<CanonicalKey>,
}

/// Keep the first occurrence of every canonical key.
///
/// Order of the input is the priority: callers list sources in configured
/// order, so the first-listed source wins a collision. Survivors keep their
/// relative order, which makes the operation idempotent.
pub fn dedup_first_seen(listings: Vec<Listing>) -> DedupOutcome {
    let mut seen: HashSet<CanonicalKey> = HashSet::with_capacity(listings.len());
    let mut out = DedupOutcome {
        kept: Vec::with_capacity(listings.len()),
        dropped: Vec::new(),
    };
    for l in listings {
        let key = canonical_key(&l);
        if seen.contains(&key) {
            tracing::debug!(target: "dedup", key = %key, source = %l.source, "duplicate dropped");
            out.dropped.push(key);
            continue;
        }
        seen.insert(key);
        out.kept.push(l);
    }
    out
}
