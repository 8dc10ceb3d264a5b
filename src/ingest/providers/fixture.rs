// src/ingest/providers/fixture.rs
//! In-memory source with a scripted commit history. Used by tests and the
//! offline demo; state lives behind a mutex so a shared handle can keep
//! appending commits between runs.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::records_from_document;
use crate::ingest::types::{Commit, SourceProvider};

#[derive(Debug, Clone)]
struct FixtureCommit {
    id: String,
    parent: Option<String>,
    paths: Vec<String>,
    records: Option<Vec<Value>>,
}

#[derive(Debug, Default)]
struct Inner {
    snapshot: Vec<Value>,
    // oldest first
    commits: Vec<FixtureCommit>,
    failing: bool,
    calls: usize,
}

#[derive(Debug)]
pub struct FixtureSource {
    name: String,
    inner: Mutex<Inner>,
}

impl FixtureSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn with_snapshot(self, records: Vec<Value>) -> Self {
        self.set_snapshot(records);
        self
    }

    /// Snapshot read from a JSON file (bare array or `{"listings": [...]}`).
    pub fn from_file(name: impl Into<String>, path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading fixture {}", path.display()))?;
        let doc: Value = serde_json::from_str(&raw)
            .with_context(|| format!("parsing fixture {}", path.display()))?;
        Ok(Self::new(name).with_snapshot(records_from_document(doc)?))
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn set_snapshot(&self, records: Vec<Value>) {
        self.lock().snapshot = records;
    }

    /// Append a commit on top of the current head. `records = None` means the
    /// listings file does not exist at that commit.
    pub fn push_commit(&self, id: &str, paths: &[&str], records: Option<Vec<Value>>) {
        let mut inner = self.lock();
        let parent = inner.commits.last().map(|c| c.id.clone());
        if let Some(r) = &records {
            inner.snapshot = r.clone();
        }
        inner.commits.push(FixtureCommit {
            id: id.to_string(),
            parent,
            paths: paths.iter().map(|p| p.to_string()).collect(),
            records,
        });
    }

    /// Make every provider call fail until reset.
    pub fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
    }

    /// Number of provider calls served so far.
    pub fn calls(&self) -> usize {
        self.lock().calls
    }

    fn enter(&self) -> Result<MutexGuard<'_, Inner>> {
        let mut inner = self.lock();
        inner.calls += 1;
        if inner.failing {
            return Err(anyhow!("{}: source unavailable", self.name));
        }
        Ok(inner)
    }

    fn find<'a>(&self, inner: &'a Inner, revision: &str) -> Result<&'a FixtureCommit> {
        inner
            .commits
            .iter()
            .find(|c| c.id == revision)
            .ok_or_else(|| anyhow!("{}: unknown revision {revision}", self.name))
    }
}

#[async_trait]
impl SourceProvider for FixtureSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn snapshot(&self) -> Result<Vec<Value>> {
        Ok(self.enter()?.snapshot.clone())
    }

    async fn recent_commits(&self, limit: usize) -> Result<Vec<Commit>> {
        let inner = self.enter()?;
        Ok(inner
            .commits
            .iter()
            .rev()
            .take(limit)
            .map(|c| Commit {
                id: c.id.clone(),
                parent: c.parent.clone(),
            })
            .collect())
    }

    async fn changed_paths(&self, revision: &str) -> Result<Vec<String>> {
        let inner = self.enter()?;
        Ok(self.find(&inner, revision)?.paths.clone())
    }

    async fn records_at(&self, revision: &str) -> Result<Option<Vec<Value>>> {
        let inner = self.enter()?;
        Ok(self.find(&inner, revision)?.records.clone())
    }

    async fn parent_of(&self, revision: &str) -> Result<Option<String>> {
        let inner = self.enter()?;
        Ok(self.find(&inner, revision)?.parent.clone())
    }
}
