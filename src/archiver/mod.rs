//! The resource inlining pipeline.
//!
//! Turns a raw DOM dump plus a resource manifest into a fully self-contained
//! artifact with zero outbound references: stylesheets become `<style>`
//! blocks, images and favicons become data URIs, and anything that cannot be
//! fetched is explicitly blanked rather than left pointing at the live site.

pub mod resource_resolver;
pub mod srcset;
pub mod stylesheet;

use futures::future::join_all;
use lazy_static::lazy_static;
use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use crate::browser::ResourceManifest;
use crate::error::ArchiveError;

pub use resource_resolver::{FetchLimits, FetchOutcome, ResourceResolver, is_skippable};
pub use srcset::parse_srcset;
pub use stylesheet::{MAX_IMPORT_DEPTH, resolve_stylesheet};

/// Number of concurrent resource fetches per batch.
const FETCH_BATCH_SIZE: usize = 10;

lazy_static! {
    // Serialization tools double-encode `&` inside query strings of URL-bearing
    // attributes, which would corrupt resource lookups.
    static ref URL_ATTR_DQ_RE: Regex =
        Regex::new(r#"(?i)\b(src|href|srcset|poster|action)="([^"]*)""#)
            .expect("hardcoded attribute pattern must compile");
    static ref URL_ATTR_SQ_RE: Regex =
        Regex::new(r#"(?i)\b(src|href|srcset|poster|action)='([^']*)'"#)
            .expect("hardcoded attribute pattern must compile");

    static ref STYLE_BLOCK_RE: Regex = Regex::new(r"(?is)<style\b[^>]*>(.*?)</style>")
        .expect("hardcoded style block pattern must compile");
    static ref STYLE_ATTR_DQ_RE: Regex = Regex::new(r#"(?i)\bstyle="([^"]*)""#)
        .expect("hardcoded style attribute pattern must compile");
    static ref STYLE_ATTR_SQ_RE: Regex = Regex::new(r#"(?i)\bstyle='([^']*)'"#)
        .expect("hardcoded style attribute pattern must compile");

    static ref IMG_SELECTOR: Selector =
        Selector::parse("img[src]").expect("hardcoded selector must parse");
    static ref SRCSET_SELECTOR: Selector =
        Selector::parse("img[srcset], source[srcset]").expect("hardcoded selector must parse");
}

/// One-build resource inlining pipeline.
///
/// Each `Archiver` owns an isolated [`ResourceResolver`] (cache + fetch
/// budget); construct a fresh one per capture.
pub struct Archiver {
    resolver: ResourceResolver,
}

impl Archiver {
    #[must_use]
    pub fn new(limits: FetchLimits) -> Self {
        Self {
            resolver: ResourceResolver::new(limits),
        }
    }

    #[must_use]
    pub fn resolver(&self) -> &ResourceResolver {
        &self.resolver
    }

    /// Build a self-contained artifact from rendered HTML and its manifest.
    ///
    /// Running the pipeline again over its own output with an empty manifest
    /// returns the input unchanged.
    pub async fn build(
        &self,
        html: &str,
        manifest: &ResourceManifest,
        base_url: &str,
    ) -> Result<String, ArchiveError> {
        let base = Url::parse(base_url).map_err(|source| ArchiveError::InvalidBaseUrl {
            url: base_url.to_string(),
            source,
        })?;

        // Step 1: undo double-encoded ampersands in URL-bearing attributes.
        let mut html = normalize_attr_entities(html);

        // Step 2: resolve manifest stylesheets into <style> blocks.
        let mut style_blocks = Vec::new();
        for sheet_url in &manifest.stylesheet_urls {
            let Some(absolute) = join(&base, sheet_url) else {
                continue;
            };
            let css = resolve_stylesheet(&self.resolver, &absolute).await;
            if css.is_empty() {
                log::warn!(target: "demoforge::archive", "stylesheet {absolute} resolved to nothing");
                continue;
            }
            let source_attr = absolute.replace('"', "&quot;");
            style_blocks.push(format!(
                "<style data-source=\"{source_attr}\">\n{css}\n</style>"
            ));
        }
        if !style_blocks.is_empty() {
            html = insert_in_head(&html, &style_blocks.join("\n"));
        }

        // Step 3: inline images from the manifest, a secondary <img src> scan,
        // and srcset entries.
        let mut image_refs: Vec<String> = manifest.image_urls.clone();
        image_refs.extend(scan_image_refs(&html));
        html = self.inline_by_literal_replacement(html, &base, image_refs).await;

        // Step 4: favicons the same way.
        html = self
            .inline_by_literal_replacement(html, &base, manifest.favicon_urls.clone())
            .await;

        // Step 5: final sweep over <style> blocks and inline style attributes
        // not already covered, reusing the same cache.
        html = self.sweep_residual_css(html, base_url).await;

        log::debug!(
            target: "demoforge::archive",
            "artifact for {base_url} complete after {} resource fetches",
            self.resolver.fetches_attempted()
        );
        Ok(html)
    }

    /// Fetch every distinct resource in parallel batches and substitute each
    /// original reference (manifest form and resolved absolute form) with its
    /// data URI, or blank it on failure.
    async fn inline_by_literal_replacement(
        &self,
        mut html: String,
        base: &Url,
        refs: Vec<String>,
    ) -> String {
        let mut order: Vec<String> = Vec::new();
        let mut originals: std::collections::HashMap<String, Vec<String>> =
            std::collections::HashMap::new();
        for original in refs {
            if original.is_empty() || is_skippable(&original) {
                continue;
            }
            let Some(absolute) = join(base, &original) else {
                continue;
            };
            let entry = originals.entry(absolute.clone()).or_insert_with(|| {
                order.push(absolute);
                Vec::new()
            });
            if !entry.contains(&original) {
                entry.push(original);
            }
        }

        for batch in order.chunks(FETCH_BATCH_SIZE) {
            let outcomes = join_all(
                batch
                    .iter()
                    .map(|absolute| self.resolver.fetch_as_data_uri(absolute)),
            )
            .await;

            for (absolute, outcome) in batch.iter().zip(outcomes) {
                let replacement = match outcome {
                    FetchOutcome::Inlined(data_uri) => data_uri,
                    FetchOutcome::Empty => String::new(),
                    FetchOutcome::Skipped => continue,
                };
                // Absolute form first: a manifest-relative form may be a
                // substring of it.
                if absolute != &replacement {
                    html = html.replace(absolute.as_str(), &replacement);
                }
                for original in &originals[absolute] {
                    if original != absolute && original != &replacement {
                        html = html.replace(original.as_str(), &replacement);
                    }
                }
            }
        }
        html
    }

    /// Resolve `url()` references that survived the earlier steps, inside
    /// `<style>` blocks and inline `style=` attributes.
    async fn sweep_residual_css(&self, html: String, base_url: &str) -> String {
        let html = self
            .rewrite_ranges(html, &STYLE_BLOCK_RE, base_url)
            .await;
        let html = self
            .rewrite_ranges(html, &STYLE_ATTR_DQ_RE, base_url)
            .await;
        self.rewrite_ranges(html, &STYLE_ATTR_SQ_RE, base_url).await
    }

    async fn rewrite_ranges(&self, html: String, pattern: &Regex, base_url: &str) -> String {
        let ranges: Vec<(usize, usize, String)> = pattern
            .captures_iter(&html)
            .filter_map(|caps| {
                let inner = caps.get(1)?;
                if inner.as_str().contains("url(") {
                    Some((inner.start(), inner.end(), inner.as_str().to_string()))
                } else {
                    None
                }
            })
            .collect();

        if ranges.is_empty() {
            return html;
        }

        let mut out = String::with_capacity(html.len());
        let mut cursor = 0;
        for (start, end, css) in ranges {
            out.push_str(&html[cursor..start]);
            let resolved = stylesheet::resolve_css_urls(&self.resolver, base_url, &css).await;
            out.push_str(&resolved);
            cursor = end;
        }
        out.push_str(&html[cursor..]);
        out
    }
}

/// Replace HTML-entity-encoded ampersands inside URL-bearing attribute values.
#[must_use]
pub fn normalize_attr_entities(html: &str) -> String {
    let pass = URL_ATTR_DQ_RE.replace_all(html, |caps: &regex::Captures<'_>| {
        format!("{}=\"{}\"", &caps[1], caps[2].replace("&amp;", "&"))
    });
    URL_ATTR_SQ_RE
        .replace_all(&pass, |caps: &regex::Captures<'_>| {
            format!("{}='{}'", &caps[1], caps[2].replace("&amp;", "&"))
        })
        .into_owned()
}

/// Secondary scan for image references the manifest may have missed:
/// `img[src]` plus srcset entries on `img` and `source` elements.
fn scan_image_refs(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut refs = Vec::new();

    for element in document.select(&IMG_SELECTOR) {
        if let Some(src) = element.value().attr("src")
            && !src.starts_with("data:")
        {
            refs.push(src.to_string());
        }
    }
    for element in document.select(&SRCSET_SELECTOR) {
        if let Some(srcset) = element.value().attr("srcset") {
            refs.extend(parse_srcset(srcset));
        }
    }
    refs
}

/// Insert markup before `</head>`, falling back to before `<body>`, falling
/// back to prepending.
fn insert_in_head(html: &str, markup: &str) -> String {
    let lower = html.to_ascii_lowercase();
    if let Some(pos) = lower.find("</head>") {
        let mut out = String::with_capacity(html.len() + markup.len() + 1);
        out.push_str(&html[..pos]);
        out.push_str(markup);
        out.push('\n');
        out.push_str(&html[pos..]);
        return out;
    }
    if let Some(pos) = lower.find("<body") {
        let mut out = String::with_capacity(html.len() + markup.len() + 1);
        out.push_str(&html[..pos]);
        out.push_str(markup);
        out.push('\n');
        out.push_str(&html[pos..]);
        return out;
    }
    format!("{markup}\n{html}")
}

fn join(base: &Url, reference: &str) -> Option<String> {
    base.join(reference).ok().map(|u| u.to_string())
}
