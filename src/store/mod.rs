//! Datastore and blob store contracts.
//!
//! The relational datastore and the file store are external collaborators;
//! the core consumes them only through these typed traits. [`MemoryStore`]
//! and [`MemoryBlobStore`] back tests and single-process embedding,
//! [`FsBlobStore`] backs local artifact storage.

pub mod blob;
pub mod memory;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::RuleError;
use crate::model::{
    CaptureJob, CapturedPage, ObfuscationRule, Project, TagManagerConfig, Version,
};

pub use blob::{BlobStore, FsBlobStore, MemoryBlobStore};
pub use memory::MemoryStore;

/// Typed read/write contract over the relational datastore.
///
/// Infrastructure failures surface as `anyhow::Error` and are reported, not
/// retried, by the core; retry policy belongs to the calling service layer.
#[async_trait]
pub trait Datastore: Send + Sync {
    async fn project_by_subdomain(&self, subdomain: &str) -> anyhow::Result<Option<Project>>;

    /// Most recently created version with status `Active`.
    async fn latest_active_version(&self, project_id: Uuid) -> anyhow::Result<Option<Version>>;

    /// Pages of a version in insertion order.
    async fn pages_for_version(&self, version_id: Uuid) -> anyhow::Result<Vec<CapturedPage>>;

    async fn insert_page(&self, page: CapturedPage) -> anyhow::Result<()>;

    /// Active obfuscation rules for a project, in stable storage order.
    async fn active_rules(&self, project_id: Uuid) -> anyhow::Result<Vec<ObfuscationRule>>;

    /// Create a rule after validating it. A rejected rule is never stored.
    async fn create_rule(&self, rule: ObfuscationRule) -> anyhow::Result<Result<(), RuleError>>;

    /// Replace an existing rule after validating the replacement.
    async fn update_rule(&self, rule: ObfuscationRule) -> anyhow::Result<Result<(), RuleError>>;

    async fn tag_manager_config(
        &self,
        project_id: Uuid,
    ) -> anyhow::Result<Option<TagManagerConfig>>;

    async fn create_capture_job(&self, job: CaptureJob) -> anyhow::Result<()>;

    async fn capture_job(&self, job_id: Uuid) -> anyhow::Result<Option<CaptureJob>>;
}
