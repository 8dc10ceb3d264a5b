// src/ingest/providers/github.rs
//! GitHub REST source: one repository publishing a listings JSON file.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use super::records_from_document;
use crate::ingest::types::{Commit, SourceProvider};

const DEFAULT_API: &str = "https://api.github.com";
const RAW_ACCEPT: &str = "application/vnd.github.raw";
const JSON_ACCEPT: &str = "application/vnd.github+json";

#[derive(Debug, Deserialize)]
struct CommitRef {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct CommitSummary {
    sha: String,
    #[serde(default)]
    parents: Vec<CommitRef>,
}

#[derive(Debug, Deserialize)]
struct CommitFile {
    filename: String,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    #[serde(default)]
    parents: Vec<CommitRef>,
    #[serde(default)]
    files: Vec<CommitFile>,
}

pub struct GithubSource {
    repo: String,
    listings_path: String,
    api_base: String,
    token: Option<String>,
    client: Client,
}

impl GithubSource {
    /// `repo` is `owner/name`; `listings_path` the file inside the repository.
    pub fn new(repo: impl Into<String>, listings_path: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(20))
            .user_agent(concat!("listing-watch/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("building github http client")?;
        Ok(Self {
            repo: repo.into(),
            listings_path: listings_path.into(),
            api_base: DEFAULT_API.to_string(),
            token: None,
            client,
        })
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    /// GET with the right headers. `Ok(None)` on 404.
    async fn get(&self, path: &str, query: &[(&str, String)], accept: &str) -> Result<Option<reqwest::Response>> {
        let url = format!("{}/repos/{}/{}", self.api_base, self.repo, path);
        let mut req = self
            .client
            .get(&url)
            .header(header::ACCEPT, accept)
            .header("X-GitHub-Api-Version", "2022-11-28")
            .query(query);
        if let Some(t) = &self.token {
            req = req.bearer_auth(t);
        }
        let rsp = req
            .send()
            .await
            .with_context(|| format!("github GET {url}"))?;
        if rsp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if let Err(e) = rsp.error_for_status_ref() {
            return Err(anyhow!("github GET {url}: {e}"));
        }
        Ok(Some(rsp))
    }

    async fn commit_detail(&self, revision: &str) -> Result<CommitDetail> {
        let rsp = self
            .get(&format!("commits/{revision}"), &[], JSON_ACCEPT)
            .await?
            .ok_or_else(|| anyhow!("{}: commit {revision} not found", self.repo))?;
        rsp.json()
            .await
            .with_context(|| format!("{}: decoding commit {revision}", self.repo))
    }

    async fn listings_at(&self, revision: Option<&str>) -> Result<Option<Vec<Value>>> {
        let query: Vec<(&str, String)> = revision.map(|r| ("ref", r.to_string())).into_iter().collect();
        let Some(rsp) = self
            .get(&format!("contents/{}", self.listings_path), &query, RAW_ACCEPT)
            .await?
        else {
            return Ok(None);
        };
        let doc: Value = rsp
            .json()
            .await
            .with_context(|| format!("{}: decoding {}", self.repo, self.listings_path))?;
        records_from_document(doc).map(Some)
    }
}

#[async_trait]
impl SourceProvider for GithubSource {
    fn name(&self) -> &str {
        &self.repo
    }

    async fn snapshot(&self) -> Result<Vec<Value>> {
        self.listings_at(None)
            .await?
            .ok_or_else(|| anyhow!("{}: {} not found", self.repo, self.listings_path))
    }

    async fn recent_commits(&self, limit: usize) -> Result<Vec<Commit>> {
        let query = [("per_page", limit.clamp(1, 100).to_string())];
        let Some(rsp) = self.get("commits", &query, JSON_ACCEPT).await? else {
            return Err(anyhow!("{}: repository not found", self.repo));
        };
        let list: Vec<CommitSummary> = rsp
            .json()
            .await
            .with_context(|| format!("{}: decoding commit list", self.repo))?;
        Ok(list
            .into_iter()
            .map(|c| Commit {
                parent: c.parents.into_iter().next().map(|p| p.sha),
                id: c.sha,
            })
            .collect())
    }

    async fn changed_paths(&self, revision: &str) -> Result<Vec<String>> {
        let detail = self.commit_detail(revision).await?;
        Ok(detail.files.into_iter().map(|f| f.filename).collect())
    }

    async fn records_at(&self, revision: &str) -> Result<Option<Vec<Value>>> {
        self.listings_at(Some(revision)).await
    }

    async fn parent_of(&self, revision: &str) -> Result<Option<String>> {
        let detail = self.commit_detail(revision).await?;
        Ok(detail.parents.into_iter().next().map(|p| p.sha))
    }
}
