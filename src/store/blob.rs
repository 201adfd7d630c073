//! Blob store contract and implementations.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use tokio::sync::Mutex;

/// Flat byte store addressed by relative path
/// (`uploads/<version_id>/<page_id>.html`).
///
/// A path with no blob reads as `Ok(None)`; `Err` is reserved for
/// infrastructure failures. Callers decide what absence means.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn write(&self, path: &str, bytes: &[u8]) -> anyhow::Result<()>;
    async fn read(&self, path: &str) -> anyhow::Result<Option<Vec<u8>>>;
}

/// Filesystem-backed blob store rooted at a base directory.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn write(&self, path: &str, bytes: &[u8]) -> anyhow::Result<()> {
        let full = self.root.join(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        tokio::fs::write(&full, bytes)
            .await
            .with_context(|| format!("failed to write {}", full.display()))?;
        log::debug!(target: "demoforge::store", "wrote {} bytes to {}", bytes.len(), full.display());
        Ok(())
    }

    async fn read(&self, path: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let full = self.root.join(path);
        match tokio::fs::read(&full).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => {
                Err(e).with_context(|| format!("failed to read {}", full.display()))
            }
        }
    }
}

/// In-memory blob store for tests and single-process embedding.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn write(&self, path: &str, bytes: &[u8]) -> anyhow::Result<()> {
        self.blobs
            .lock()
            .await
            .insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn read(&self, path: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.blobs.lock().await.get(path).cloned())
    }
}
