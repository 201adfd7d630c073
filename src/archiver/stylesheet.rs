//! Recursive stylesheet resolution.
//!
//! Resolves `@import` chains and in-CSS `url()` references into a single
//! self-contained block of CSS text. Imports resolve first, then `url()`
//! references, so imported CSS has its own references resolved by the
//! recursive call before the text is spliced in.

use std::collections::HashSet;

use futures::future::BoxFuture;
use lazy_static::lazy_static;
use regex::Regex;
use url::Url;

use super::resource_resolver::{FetchOutcome, ResourceResolver, is_skippable};

/// Maximum `@import` nesting depth before resolution gives up with empty text.
pub const MAX_IMPORT_DEPTH: u32 = 15;

lazy_static! {
    // Both @import forms: `@import url(...)` and `@import "..."`, with any
    // trailing media query up to the terminating semicolon.
    static ref IMPORT_RE: Regex = Regex::new(
        r#"(?i)@import\s+(?:url\(\s*(?:"([^"]*)"|'([^']*)'|([^'")\s]+))\s*\)|"([^"]*)"|'([^']*)')[^;]*;?"#
    )
    .expect("hardcoded @import pattern must compile");

    static ref CSS_URL_RE: Regex = Regex::new(
        r#"(?i)url\(\s*(?:"([^"]*)"|'([^']*)'|([^'")\s]+))\s*\)"#
    )
    .expect("hardcoded url() pattern must compile");
}

/// Resolve a stylesheet URL into self-contained CSS text.
///
/// Failures degrade to empty text; callers decide whether an empty result is
/// worth emitting.
pub async fn resolve_stylesheet(resolver: &ResourceResolver, url: &str) -> String {
    let mut visited = HashSet::new();
    resolve_recursive(resolver, url.to_string(), 0, &mut visited).await
}

fn resolve_recursive<'a>(
    resolver: &'a ResourceResolver,
    url: String,
    depth: u32,
    visited: &'a mut HashSet<String>,
) -> BoxFuture<'a, String> {
    Box::pin(async move {
        // Cycle and depth protection, before any network call.
        if depth > MAX_IMPORT_DEPTH {
            log::debug!(target: "demoforge::archive", "import depth exceeded at {url}");
            return String::new();
        }
        if !visited.insert(url.clone()) {
            log::debug!(target: "demoforge::archive", "import cycle at {url}");
            return String::new();
        }

        let Some(css) = resolver.fetch_text(&url).await else {
            return String::new();
        };

        let css = resolve_imports(resolver, &url, css, depth, visited).await;
        resolve_css_urls(resolver, &url, &css).await
    })
}

/// Replace every `@import` statement with its recursively resolved text.
///
/// The directive itself is always removed, successful or not, so no residual
/// `@import` pointing outward survives.
async fn resolve_imports(
    resolver: &ResourceResolver,
    stylesheet_url: &str,
    css: String,
    depth: u32,
    visited: &mut HashSet<String>,
) -> String {
    let imports: Vec<(usize, usize, Option<String>)> = IMPORT_RE
        .captures_iter(&css)
        .map(|caps| {
            let whole = caps.get(0).expect("group 0 always present");
            let target = caps
                .get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .or_else(|| caps.get(5))
                .map(|m| m.as_str().trim().to_string());
            (whole.start(), whole.end(), target)
        })
        .collect();

    if imports.is_empty() {
        return css;
    }

    let mut out = String::with_capacity(css.len());
    let mut cursor = 0;
    for (start, end, target) in imports {
        out.push_str(&css[cursor..start]);
        cursor = end;

        let Some(target) = target else { continue };
        let Some(absolute) = join_url(stylesheet_url, &target) else {
            continue;
        };
        let resolved = resolve_recursive(resolver, absolute, depth + 1, visited).await;
        out.push_str(&resolved);
    }
    out.push_str(&css[cursor..]);
    out
}

/// Replace `url(...)` references with inlined data URIs.
///
/// Skippable references stay untouched; failures become `url("")`.
pub(super) async fn resolve_css_urls(
    resolver: &ResourceResolver,
    base_url: &str,
    css: &str,
) -> String {
    let refs: Vec<(usize, usize, String)> = CSS_URL_RE
        .captures_iter(css)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let target = caps
                .get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))?
                .as_str()
                .trim()
                .to_string();
            Some((whole.start(), whole.end(), target))
        })
        .collect();

    if refs.is_empty() {
        return css.to_string();
    }

    let mut out = String::with_capacity(css.len());
    let mut cursor = 0;
    for (start, end, target) in refs {
        out.push_str(&css[cursor..start]);
        cursor = end;

        if target.is_empty() || is_skippable(&target) {
            out.push_str(&css[start..end]);
            continue;
        }

        let absolute = match join_url(base_url, &target) {
            Some(u) => u,
            None => {
                out.push_str("url(\"\")");
                continue;
            }
        };

        match resolver.fetch_as_data_uri(&absolute).await {
            FetchOutcome::Inlined(data_uri) => {
                out.push_str("url(\"");
                out.push_str(&data_uri);
                out.push_str("\")");
            }
            FetchOutcome::Skipped => out.push_str(&css[start..end]),
            FetchOutcome::Empty => out.push_str("url(\"\")"),
        }
    }
    out.push_str(&css[cursor..]);
    out
}

fn join_url(base: &str, reference: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    base.join(reference).ok().map(|u| u.to_string())
}
