//! The browser capture agent boundary.
//!
//! The core never touches a live DOM. Whatever automation backend renders the
//! page (a CDP-driven headless browser, a WebDriver session, a test stub) sits
//! behind [`BrowserAgent`] and hands the core plain data: the serialized HTML,
//! the page title, the final URL, and a manifest of external resource URLs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// External resource URLs collected while the page rendered.
///
/// Produced once per capture by the browser agent and consumed exactly once
/// by the archiver; never mutated or shared across builds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceManifest {
    pub stylesheet_urls: Vec<String>,
    pub image_urls: Vec<String>,
    pub favicon_urls: Vec<String>,
}

impl ResourceManifest {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stylesheet_urls.is_empty()
            && self.image_urls.is_empty()
            && self.favicon_urls.is_empty()
    }
}

/// Raw output of rendering one page.
#[derive(Debug, Clone)]
pub struct PageCapture {
    pub html: String,
    pub title: String,
    /// Final URL after any redirects.
    pub url: String,
    pub manifest: ResourceManifest,
}

/// A link extracted from a rendered page, with its anchor text for
/// blacklist filtering.
#[derive(Debug, Clone)]
pub struct ExtractedLink {
    /// Absolute URL.
    pub url: String,
    pub text: String,
}

/// The automation backend contract.
///
/// Implementations own navigation, load waiting (best-effort, up to ~15s),
/// and DOM serialization. Only one navigation is ever requested at a time:
/// the crawl loop is single-threaded over a single tab.
#[async_trait]
pub trait BrowserAgent: Send + Sync {
    /// Navigate to `url`, wait for the page to settle, and capture its DOM
    /// and resource manifest.
    async fn capture_dom(&self, url: &str) -> anyhow::Result<PageCapture>;

    /// Extract outgoing links from the currently rendered page.
    async fn extract_links(&self, url: &str) -> anyhow::Result<Vec<ExtractedLink>>;
}
