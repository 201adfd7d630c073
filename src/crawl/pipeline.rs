//! The capture write path: agent output → archiver → blob store → datastore.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use url::Url;
use uuid::Uuid;

use crate::archiver::{Archiver, FetchLimits};
use crate::browser::PageCapture;
use crate::model::{CaptureMode, CapturedPage, HealthStatus, PageType};
use crate::store::{BlobStore, Datastore};

use super::CaptureSink;
use super::session::FrontierItem;

/// Concrete [`CaptureSink`] that archives a capture and persists it.
///
/// A fresh [`Archiver`] is built per page, so every artifact gets its own
/// resource cache and fetch budget.
pub struct CapturePipeline {
    store: Arc<dyn Datastore>,
    blob: Arc<dyn BlobStore>,
    version_id: Uuid,
    limits: FetchLimits,
}

impl CapturePipeline {
    #[must_use]
    pub fn new(store: Arc<dyn Datastore>, blob: Arc<dyn BlobStore>, version_id: Uuid) -> Self {
        Self {
            store,
            blob,
            version_id,
            limits: FetchLimits::default(),
        }
    }

    #[must_use]
    pub fn with_limits(mut self, limits: FetchLimits) -> Self {
        self.limits = limits;
        self
    }
}

#[async_trait]
impl CaptureSink for CapturePipeline {
    async fn store(&self, capture: &PageCapture, item: &FrontierItem) -> anyhow::Result<()> {
        if capture.manifest.is_empty() {
            log::debug!(
                target: "demoforge::crawl",
                "{} reported no external resources",
                capture.url
            );
        }
        let archiver = Archiver::new(self.limits.clone());
        let artifact = archiver
            .build(&capture.html, &capture.manifest, &capture.url)
            .await?;

        let page = CapturedPage {
            id: Uuid::new_v4(),
            version_id: self.version_id,
            source_url: capture.url.clone(),
            url_path: derive_url_path(&capture.url)?,
            synthetic_url: None,
            title: capture.title.clone(),
            file_size: artifact.len(),
            capture_mode: CaptureMode::Crawl,
            page_type: PageType::Page,
            parent_page_id: None,
            health_status: HealthStatus::Healthy,
            created_at: Utc::now(),
        };

        self.blob
            .write(&page.artifact_path(), artifact.as_bytes())
            .await?;
        self.store.insert_page(page.clone()).await?;

        log::info!(
            target: "demoforge::crawl",
            "captured {} ({} bytes, depth {})",
            page.source_url,
            page.file_size,
            item.depth
        );
        Ok(())
    }
}

/// Derive the demo addressing path for a captured URL.
///
/// Normalized once at capture time: no leading/trailing slash, no query
/// string. The site root maps to `index` so exact matching and the alias
/// fallback share one representation.
pub fn derive_url_path(url: &str) -> anyhow::Result<String> {
    let parsed = Url::parse(url)?;
    let path = parsed.path().trim_matches('/');
    if path.is_empty() {
        Ok("index".to_string())
    } else {
        Ok(path.to_string())
    }
}
