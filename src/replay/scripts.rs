//! Static markup injected into served pages.

/// Navigation interceptor.
///
/// Captured pages are static; clicks on rewritten `/demo/...` links are
/// relayed to the host frame as a message instead of causing a full
/// navigation inside the embed.
pub const NAV_INTERCEPTOR: &str = r#"<script>
(function () {
  document.addEventListener('click', function (event) {
    var anchor = event.target && event.target.closest ? event.target.closest('a[href]') : null;
    if (!anchor) return;
    var href = anchor.getAttribute('href');
    if (!href || href.indexOf('/demo/') !== 0) return;
    event.preventDefault();
    window.parent.postMessage({ type: 'demo:navigate', href: href }, '*');
  }, true);
})();
</script>"#;

/// Standard tag-manager loader for a container id.
#[must_use]
pub fn tag_manager_snippet(container_id: &str) -> String {
    format!(
        "<script async src=\"https://www.googletagmanager.com/gtm.js?id={container_id}\"></script>"
    )
}

/// Insert markup before `</body>`, appending when the tag is absent.
#[must_use]
pub fn inject_before_body_end(html: &str, markup: &str) -> String {
    let lower = html.to_ascii_lowercase();
    match lower.rfind("</body>") {
        Some(pos) => {
            let mut out = String::with_capacity(html.len() + markup.len() + 1);
            out.push_str(&html[..pos]);
            out.push_str(markup);
            out.push('\n');
            out.push_str(&html[pos..]);
            out
        }
        None => format!("{html}\n{markup}"),
    }
}
