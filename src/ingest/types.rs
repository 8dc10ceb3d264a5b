// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::classify::Category;

/// One validated job listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub id: Option<String>,
    pub url: Option<String>,
    pub company: String,
    pub title: String,
    pub category_raw: Option<String>,
    pub category: Category,
    pub requires_graduate_degree: bool,
    #[serde(default)]
    pub locations: Vec<String>,
    #[serde(default)]
    pub season: Option<String>,
    pub date_posted: Option<DateTime<Utc>>,
    pub date_updated: Option<DateTime<Utc>>,
    pub source: String, // e.g. "SimplifyJobs/Summer2026-Internships"
}

impl Listing {
    /// Timestamp used by the recency window: posted, else updated.
    pub fn effective_timestamp(&self) -> Option<DateTime<Utc>> {
        self.date_posted.or(self.date_updated)
    }

    /// Timestamp used for reopen detection: updated, else posted.
    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.date_updated.or(self.date_posted)
    }

    /// Owner part of the source identifier ("owner/repo" → "owner").
    pub fn source_owner(&self) -> &str {
        self.source.split('/').next().unwrap_or(&self.source)
    }
}

/// Why a raw record did not become a `Listing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    NotARecord,
    MissingIdentity,
    MalformedTimestamp,
    Inactive,
}

impl RejectReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectReason::NotARecord => "not_a_record",
            RejectReason::MissingIdentity => "missing_identity",
            RejectReason::MalformedTimestamp => "malformed_timestamp",
            RejectReason::Inactive => "inactive",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A commit of a source's history, as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub id: String,
    pub parent: Option<String>,
}

/// Access to one content source.
///
/// Commit lists are newest first. `records_at` returns `None` when the
/// listings file does not exist at that revision.
#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Current full record set.
    async fn snapshot(&self) -> Result<Vec<serde_json::Value>>;

    async fn recent_commits(&self, limit: usize) -> Result<Vec<Commit>>;

    async fn changed_paths(&self, revision: &str) -> Result<Vec<String>>;

    async fn records_at(&self, revision: &str) -> Result<Option<Vec<serde_json::Value>>>;

    async fn parent_of(&self, revision: &str) -> Result<Option<String>>;
}

#[async_trait::async_trait]
impl<T: SourceProvider + ?Sized> SourceProvider for std::sync::Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn snapshot(&self) -> Result<Vec<serde_json::Value>> {
        (**self).snapshot().await
    }

    async fn recent_commits(&self, limit: usize) -> Result<Vec<Commit>> {
        (**self).recent_commits(limit).await
    }

    async fn changed_paths(&self, revision: &str) -> Result<Vec<String>> {
        (**self).changed_paths(revision).await
    }

    async fn records_at(&self, revision: &str) -> Result<Option<Vec<serde_json::Value>>> {
        (**self).records_at(revision).await
    }

    async fn parent_of(&self, revision: &str) -> Result<Option<String>> {
        (**self).parent_of(revision).await
    }
}
