//! Persistent record types shared across the capture and replay pipelines.
//!
//! These structs mirror the datastore rows one-to-one. The datastore itself is
//! an external collaborator consumed through the traits in [`crate::store`];
//! nothing in here knows about SQL.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A customer project. One project owns many versions and one subdomain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    /// Subdomain the demo is served under (`/demo/<subdomain>/...`).
    pub subdomain: String,
}

/// Lifecycle state of a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionStatus {
    Draft,
    Active,
    Archived,
}

/// A snapshot set of captured pages. Replay always serves the most recently
/// created active version of a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Version {
    pub id: Uuid,
    pub project_id: Uuid,
    pub status: VersionStatus,
    pub created_at: DateTime<Utc>,
}

/// How a page was captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    /// Discovered and captured by the autonomous crawl loop.
    Crawl,
    /// Captured one-off by an operator.
    Manual,
}

/// Structural role of a page within a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageType {
    Page,
    /// A fingerprint-addressed SPA state without a real navigable URL.
    State,
}

/// Health of a stored page artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Broken,
}

/// A captured page. The artifact bytes live in the blob store at
/// `uploads/<version_id>/<page_id>.html`; this record carries everything else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapturedPage {
    pub id: Uuid,
    pub version_id: Uuid,
    /// The live URL the page was captured from.
    pub source_url: String,
    /// Normalized path used for demo addressing: no leading/trailing slash,
    /// no query string. Derived once at capture time, never recomputed.
    pub url_path: String,
    /// Stable fingerprint-derived identifier for SPA states that lack a real
    /// navigable URL.
    pub synthetic_url: Option<String>,
    pub title: String,
    pub file_size: usize,
    pub capture_mode: CaptureMode,
    pub page_type: PageType,
    pub parent_page_id: Option<Uuid>,
    pub health_status: HealthStatus,
    pub created_at: DateTime<Utc>,
}

impl CapturedPage {
    /// Blob store path for this page's artifact.
    #[must_use]
    pub fn artifact_path(&self) -> String {
        format!("uploads/{}/{}.html", self.version_id, self.id)
    }
}

/// An operator-authored text substitution applied at replay time.
///
/// Validated when created or updated (see [`crate::obfuscation::validate`]);
/// application never re-validates. Rules apply in ascending `ordinal` order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObfuscationRule {
    pub id: Uuid,
    pub project_id: Uuid,
    pub search_term: String,
    pub replace_term: String,
    pub is_regex: bool,
    pub is_active: bool,
    pub ordinal: i32,
}

/// Third-party tag-manager configuration injected into served pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagManagerConfig {
    pub container_id: String,
    pub is_active: bool,
}

/// A capture job record driving one crawl run.
///
/// The `config` column is JSON in the datastore; it is structured in memory
/// and serialized only at the boundary (see [`crate::config::CaptureJobConfig`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureJob {
    pub id: Uuid,
    pub project_id: Uuid,
    pub version_id: Uuid,
    pub config: crate::config::CaptureJobConfig,
    pub created_at: DateTime<Utc>,
}

/// Replay output: the transformed HTML plus enough identity for the serving
/// layer to build headers and host-frame messages.
#[derive(Debug, Clone)]
pub struct ServedPage {
    pub html: String,
    pub page_id: Uuid,
    pub page_title: String,
    pub url_path: String,
    pub project_id: Uuid,
    pub project_name: String,
    pub subdomain: String,
}
