//! Internal link rewriting for served pages.
//!
//! Hrefs pointing at a captured page's source URL (or its synthetic URL) are
//! rewritten to the demo addressing scheme; external and already-relative
//! links stay untouched. `<base>` tags are stripped — a surviving base tag
//! would silently re-root every rewritten relative reference once the page is
//! embedded.

use std::collections::HashMap;

use anyhow::Result;
use lol_html::{HtmlRewriter, Settings, element};

use crate::model::CapturedPage;

/// Rewrite internal links in `html` for the given version's page set.
pub fn rewrite_links(html: &str, pages: &[CapturedPage], subdomain: &str) -> Result<String> {
    let mut targets: HashMap<String, String> = HashMap::new();
    for page in pages {
        let demo_href = format!("/demo/{subdomain}/{}", page.url_path);
        targets.insert(page.source_url.clone(), demo_href.clone());
        // Trailing-slash variant of the source URL resolves to the same page.
        targets.insert(
            page.source_url.trim_end_matches('/').to_string(),
            demo_href.clone(),
        );
        if let Some(synthetic) = &page.synthetic_url {
            targets.insert(synthetic.clone(), demo_href);
        }
    }

    let mut output = Vec::new();
    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![
                element!("a[href]", |el| {
                    if let Some(href) = el.get_attribute("href")
                        && let Some(demo_href) = targets.get(href.as_str())
                    {
                        el.set_attribute("href", demo_href)?;
                    }
                    Ok(())
                }),
                element!("base", |el| {
                    el.remove();
                    Ok(())
                }),
            ],
            ..Settings::default()
        },
        |chunk: &[u8]| output.extend_from_slice(chunk),
    );

    rewriter
        .write(html.as_bytes())
        .map_err(|e| anyhow::anyhow!("HtmlRewriter error: {e}"))?;
    rewriter
        .end()
        .map_err(|e| anyhow::anyhow!("HtmlRewriter end error: {e}"))?;

    String::from_utf8(output).map_err(|e| anyhow::anyhow!("Invalid UTF-8 in rewritten HTML: {e}"))
}
