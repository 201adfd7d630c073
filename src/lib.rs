//! demoforge: capture live web pages as self-contained snapshots and replay
//! them as interactive, obfuscated product demos.
//!
//! Three pipelines do the heavy lifting:
//!
//! 1. **Archiving** ([`archiver`]) — a raw DOM dump plus a resource manifest
//!    becomes a self-contained artifact with zero outbound references.
//! 2. **Crawling** ([`crawl`]) — a BFS session autonomously decides which
//!    same-origin links to visit next while capturing a live application.
//! 3. **Replay** ([`replay`]) — a stored artifact is resolved and transformed
//!    into a servable response: obfuscation, link rewriting, script injection.
//!
//! The browser automation backend, the relational datastore, and the blob
//! store are external collaborators behind the traits in [`browser`] and
//! [`store`].

pub mod archiver;
pub mod browser;
pub mod config;
pub mod crawl;
pub mod error;
pub mod model;
pub mod obfuscation;
pub mod replay;
pub mod retry;
pub mod store;

pub use archiver::{Archiver, FetchLimits, FetchOutcome, ResourceResolver, resolve_stylesheet};
pub use browser::{BrowserAgent, ExtractedLink, PageCapture, ResourceManifest};
pub use config::{CaptureJobConfig, CaptureJobMode, InterestZone};
pub use crawl::{CapturePipeline, CaptureSink, CrawlControl, CrawlSession, CrawlSummary, FrontierItem};
pub use error::{ArchiveError, CrawlError, ReplayError, RuleError};
pub use model::{
    CaptureJob, CaptureMode, CapturedPage, HealthStatus, ObfuscationRule, PageType, Project,
    ServedPage, TagManagerConfig, Version, VersionStatus,
};
pub use replay::ReplayResolver;
pub use retry::RetryPolicy;
pub use store::{BlobStore, Datastore, FsBlobStore, MemoryBlobStore, MemoryStore};

/// Run a full capture job: crawl from the job's start URL through `agent`,
/// archiving every captured page into `blob` and `store` under `version_id`.
pub async fn run_capture_job(
    config: &CaptureJobConfig,
    agent: &dyn BrowserAgent,
    store: std::sync::Arc<dyn Datastore>,
    blob: std::sync::Arc<dyn BlobStore>,
    version_id: uuid::Uuid,
) -> Result<CrawlSummary, CrawlError> {
    let pipeline = CapturePipeline::new(store, blob, version_id);
    let mut session = CrawlSession::new(config)?;
    session.run(agent, &pipeline).await
}
