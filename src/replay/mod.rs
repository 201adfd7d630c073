//! Replay resolution: subdomain + request path → served demo page.
//!
//! Stateless with respect to shared mutable state: every request reads an
//! immutable stored artifact and read-only configuration, so unbounded
//! concurrent requests need no locking here.

pub mod link_rewriter;
pub mod scripts;

use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ReplayError;
use crate::model::{CapturedPage, ServedPage};
use crate::obfuscation;
use crate::store::{BlobStore, Datastore};

pub use link_rewriter::rewrite_links;
pub use scripts::{NAV_INTERCEPTOR, inject_before_body_end, tag_manager_snippet};

/// Fallback aliases tried, in order, when neither an exact path nor a
/// synthetic URL matches.
const PAGE_ALIASES: [&str; 3] = ["index", "home", "dashboard"];

lazy_static! {
    // Synthetic URLs are fingerprint-derived; a path segment with a long hex
    // run is the only kind of request worth a synthetic lookup.
    static ref FINGERPRINT_RE: Regex =
        Regex::new(r"(?i)[0-9a-f]{8,}").expect("hardcoded fingerprint pattern must compile");
}

/// Resolves and transforms stored artifacts into servable responses.
pub struct ReplayResolver {
    store: Arc<dyn Datastore>,
    blob: Arc<dyn BlobStore>,
}

impl ReplayResolver {
    #[must_use]
    pub fn new(store: Arc<dyn Datastore>, blob: Arc<dyn BlobStore>) -> Self {
        Self { store, blob }
    }

    /// Resolve project → version → page, then pipe the stored artifact
    /// through obfuscation, link rewriting, and script injection.
    ///
    /// Any missing project, version, page, or artifact is
    /// [`ReplayError::NotFound`]; datastore and blob failures are
    /// [`ReplayError::Internal`].
    pub async fn resolve(
        &self,
        subdomain: &str,
        request_path: &str,
    ) -> Result<ServedPage, ReplayError> {
        let project = self
            .store
            .project_by_subdomain(subdomain)
            .await?
            .ok_or(ReplayError::NotFound)?;

        let version = self
            .store
            .latest_active_version(project.id)
            .await?
            .ok_or(ReplayError::NotFound)?;

        let pages = self.store.pages_for_version(version.id).await?;
        let page = select_page(&pages, request_path).ok_or(ReplayError::NotFound)?;

        log::debug!(
            target: "demoforge::replay",
            "serving {}/{} as {}",
            subdomain,
            request_path,
            page.url_path
        );

        let artifact = self
            .blob
            .read(&page.artifact_path())
            .await?
            .ok_or(ReplayError::NotFound)?;
        let html = String::from_utf8_lossy(&artifact).into_owned();

        let rules = self.store.active_rules(project.id).await?;
        let html = obfuscation::apply(&html, &rules);

        let html = rewrite_links(&html, &pages, &project.subdomain)?;

        let mut html = inject_before_body_end(&html, NAV_INTERCEPTOR);
        if let Some(tag_manager) = self.store.tag_manager_config(project.id).await?
            && tag_manager.is_active
        {
            html = inject_before_body_end(&html, &tag_manager_snippet(&tag_manager.container_id));
        }

        Ok(ServedPage {
            html,
            page_id: page.id,
            page_title: page.title.clone(),
            url_path: page.url_path.clone(),
            project_id: project.id,
            project_name: project.name,
            subdomain: project.subdomain,
        })
    }
}

/// Pick the page for a request path through the fixed fallback chain:
/// exact `url_path` match → synthetic URL (fingerprint-looking paths only) →
/// alias list → first page of the version.
#[must_use]
pub fn select_page<'a>(pages: &'a [CapturedPage], request_path: &str) -> Option<&'a CapturedPage> {
    let normalized = normalize_request_path(request_path);

    if let Some(page) = pages.iter().find(|p| p.url_path == normalized) {
        return Some(page);
    }

    if FINGERPRINT_RE.is_match(&normalized)
        && let Some(page) = pages.iter().find(|p| {
            p.synthetic_url
                .as_deref()
                .is_some_and(|s| normalize_request_path(s) == normalized)
        })
    {
        return Some(page);
    }

    for alias in PAGE_ALIASES {
        if let Some(page) = pages.iter().find(|p| p.url_path == alias) {
            return Some(page);
        }
    }

    // Last resort: a non-empty version always serves something.
    pages.first()
}

/// Normalize a request path the same way `url_path` is derived: no
/// leading/trailing slash, no query string; empty becomes `index`.
#[must_use]
pub fn normalize_request_path(path: &str) -> String {
    let without_query = path.split(['?', '#']).next().unwrap_or(path);
    let trimmed = without_query.trim_matches('/');
    if trimmed.is_empty() {
        "index".to_string()
    } else {
        trimmed.to_string()
    }
}
