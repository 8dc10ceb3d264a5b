// src/state.rs
//! Opaque key→blob persistence plus the key layout of a workflow identity.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::fs;

#[async_trait::async_trait]
pub trait StateStore: Send + Sync {
    /// `Ok(None)` when nothing was stored under `key` yet.
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn save(&self, key: &str, blob: &[u8]) -> Result<()>;
}

pub fn seen_key(identity: &str) -> String {
    format!("seen/{identity}.json")
}

pub fn pending_key(identity: &str) -> String {
    format!("pending/{identity}.json")
}

pub fn marker_key(identity: &str, source: &str) -> String {
    format!("markers/{identity}/{}", source.replace('/', "__"))
}

/// Files under a root directory (default `state/`).
#[derive(Debug, Clone)]
pub struct FileStateStore {
    root: PathBuf,
}

impl FileStateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // Keys are '/'-separated; every segment is reduced to a safe file name.
    fn path_for(&self, key: &str) -> PathBuf {
        let mut p = self.root.clone();
        for seg in key.split('/').filter(|s| !s.is_empty()) {
            let clean: String = seg
                .chars()
                .map(|c| {
                    if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                        c
                    } else {
                        '_'
                    }
                })
                .collect();
            let clean = if clean.chars().all(|c| c == '.') {
                clean.replace('.', "_")
            } else {
                clean
            };
            p.push(clean);
        }
        p
    }
}

#[async_trait::async_trait]
impl StateStore for FileStateStore {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key);
        match fs::read(&path).await {
            Ok(b) => Ok(Some(b)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading state {}", path.display())),
        }
    }

    async fn save(&self, key: &str, blob: &[u8]) -> Result<()> {
        let path = self.path_for(key);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("creating state dir {}", dir.display()))?;
        }
        // tmp + rename: readers see the old blob or the new one, never half
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, blob)
            .await
            .with_context(|| format!("writing state {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("replacing state {}", path.display()))?;
        Ok(())
    }
}

/// In-process store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything stored, for byte-level comparisons.
    pub fn dump(&self) -> HashMap<String, Vec<u8>> {
        self.blobs.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.blobs
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(key)
            .cloned()
    }
}

#[async_trait::async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.get(key))
    }

    async fn save(&self, key: &str, blob: &[u8]) -> Result<()> {
        self.blobs
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(key.to_string(), blob.to_vec());
        Ok(())
    }
}
