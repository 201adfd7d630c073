//! Archiver pipeline tests against a local mock HTTP server.

use demoforge::archiver::{
    Archiver, FetchLimits, FetchOutcome, ResourceResolver, resolve_stylesheet,
};
use demoforge::browser::ResourceManifest;
use demoforge::retry::RetryPolicy;
use std::io::Write;

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn small_limits(max_bytes: usize, max_fetches: usize) -> FetchLimits {
    FetchLimits {
        max_fetches,
        max_bytes,
        ..FetchLimits::default()
    }
}

#[tokio::test]
async fn nested_imports_resolve_to_self_contained_css() {
    let mut server = mockito::Server::new_async().await;
    let base = server.url();

    server
        .mock("GET", "/a.css")
        .with_header("content-type", "text/css")
        .with_body("@import url(\"b.css\");\nbody { background: url(bg.png); }")
        .create_async()
        .await;
    server
        .mock("GET", "/b.css")
        .with_header("content-type", "text/css")
        .with_body("@import \"c.css\";\nh1 { color: red; }")
        .create_async()
        .await;
    server
        .mock("GET", "/c.css")
        .with_header("content-type", "text/css")
        .with_body("p { margin: 0; }")
        .create_async()
        .await;
    server
        .mock("GET", "/bg.png")
        .with_header("content-type", "image/png")
        .with_body([0x89u8, 0x50, 0x4e, 0x47].as_slice())
        .create_async()
        .await;

    let resolver = ResourceResolver::new(FetchLimits::default());
    let css = resolve_stylesheet(&resolver, &format!("{base}/a.css")).await;

    assert!(!css.contains("@import"));
    assert!(css.contains("margin: 0"));
    assert!(css.contains("color: red"));
    assert!(css.contains("url(\"data:image/png;base64,"));
    assert!(!css.contains("http://"), "raw http reference survived: {css}");
}

#[tokio::test]
async fn cyclic_imports_terminate_with_single_contribution() {
    let mut server = mockito::Server::new_async().await;
    let base = server.url();

    server
        .mock("GET", "/x.css")
        .with_header("content-type", "text/css")
        .with_body("@import url(\"y.css\");\n.x { top: 0; }")
        .expect(1)
        .create_async()
        .await;
    server
        .mock("GET", "/y.css")
        .with_header("content-type", "text/css")
        .with_body("@import url(\"x.css\");\n.y { left: 0; }")
        .expect(1)
        .create_async()
        .await;

    let resolver = ResourceResolver::new(FetchLimits::default());
    let css = resolve_stylesheet(&resolver, &format!("{base}/x.css")).await;

    assert!(!css.contains("@import"));
    assert_eq!(css.matches(".x { top: 0; }").count(), 1);
    assert_eq!(css.matches(".y { left: 0; }").count(), 1);
}

#[tokio::test]
async fn failed_import_is_removed_not_left_dangling() {
    let mut server = mockito::Server::new_async().await;
    let base = server.url();

    server
        .mock("GET", "/main.css")
        .with_header("content-type", "text/css")
        .with_body("@import url(\"gone.css\");\nbody { color: blue; }")
        .create_async()
        .await;
    server
        .mock("GET", "/gone.css")
        .with_status(404)
        .create_async()
        .await;

    let resolver = ResourceResolver::new(FetchLimits::default());
    let css = resolve_stylesheet(&resolver, &format!("{base}/main.css")).await;

    assert!(!css.contains("@import"));
    assert!(!css.contains("gone.css"));
    assert!(css.contains("color: blue"));
}

#[tokio::test]
async fn oversize_body_without_length_header_is_dropped() {
    let mut server = mockito::Server::new_async().await;
    let base = server.url();

    // Chunked transfer: no Content-Length, so only the streamed re-check can
    // catch the violation.
    server
        .mock("GET", "/big.bin")
        .with_header("content-type", "image/png")
        .with_chunked_body(|w| {
            for _ in 0..8 {
                w.write_all(&[0u8; 512])?;
            }
            Ok(())
        })
        .create_async()
        .await;

    let resolver = ResourceResolver::new(small_limits(1024, 500));
    let outcome = resolver.fetch_as_data_uri(&format!("{base}/big.bin")).await;
    assert_eq!(outcome, FetchOutcome::Empty);
}

#[tokio::test]
async fn oversize_declared_length_is_dropped_before_download() {
    let mut server = mockito::Server::new_async().await;
    let base = server.url();

    server
        .mock("GET", "/big.png")
        .with_header("content-type", "image/png")
        .with_body(vec![0u8; 4096])
        .create_async()
        .await;

    let resolver = ResourceResolver::new(small_limits(1024, 500));
    let outcome = resolver.fetch_as_data_uri(&format!("{base}/big.png")).await;
    assert_eq!(outcome, FetchOutcome::Empty);
}

#[tokio::test]
async fn fetch_budget_blanks_further_resources_without_network() {
    let mut server = mockito::Server::new_async().await;
    let base = server.url();

    server
        .mock("GET", "/one.png")
        .with_header("content-type", "image/png")
        .with_body("a")
        .expect(1)
        .create_async()
        .await;
    let never_called = server
        .mock("GET", "/two.png")
        .with_body("b")
        .expect(0)
        .create_async()
        .await;

    let resolver = ResourceResolver::new(small_limits(1024 * 1024, 1));
    let first = resolver.fetch_as_data_uri(&format!("{base}/one.png")).await;
    let second = resolver.fetch_as_data_uri(&format!("{base}/two.png")).await;

    assert!(matches!(first, FetchOutcome::Inlined(_)));
    assert_eq!(second, FetchOutcome::Empty);
    never_called.assert_async().await;
}

#[tokio::test]
async fn generic_content_type_falls_back_to_extension_table() {
    let mut server = mockito::Server::new_async().await;
    let base = server.url();

    server
        .mock("GET", "/font.woff2")
        .with_header("content-type", "application/octet-stream")
        .with_body("fontbytes")
        .create_async()
        .await;

    let resolver = ResourceResolver::new(FetchLimits::default());
    match resolver.fetch_as_data_uri(&format!("{base}/font.woff2")).await {
        FetchOutcome::Inlined(data_uri) => {
            assert!(data_uri.starts_with("data:font/woff2;base64,"), "{data_uri}");
        }
        other => panic!("expected inline, got {other:?}"),
    }
}

#[tokio::test]
async fn no_retry_policy_degrades_server_errors_in_one_attempt() {
    let mut server = mockito::Server::new_async().await;
    let base = server.url();

    let mock = server
        .mock("GET", "/flaky.png")
        .with_status(500)
        .expect(1)
        .create_async()
        .await;

    let resolver =
        ResourceResolver::new(FetchLimits::default()).with_retry(RetryPolicy::none());
    let outcome = resolver.fetch_as_data_uri(&format!("{base}/flaky.png")).await;

    assert_eq!(outcome, FetchOutcome::Empty);
    mock.assert_async().await;
}

#[tokio::test]
async fn successful_fetches_are_memoized_per_build() {
    let mut server = mockito::Server::new_async().await;
    let base = server.url();

    let mock = server
        .mock("GET", "/logo.png")
        .with_header("content-type", "image/png")
        .with_body("png")
        .expect(1)
        .create_async()
        .await;

    let resolver = ResourceResolver::new(FetchLimits::default());
    let url = format!("{base}/logo.png");
    let first = resolver.fetch_as_data_uri(&url).await;
    let second = resolver.fetch_as_data_uri(&url).await;

    assert_eq!(first, second);
    mock.assert_async().await;
}

#[tokio::test]
async fn build_produces_artifact_without_outbound_references() {
    init_logs();
    let mut server = mockito::Server::new_async().await;
    let base = server.url();

    server
        .mock("GET", "/theme.css")
        .with_header("content-type", "text/css")
        .with_body("h1 { color: teal; }")
        .create_async()
        .await;
    server
        .mock("GET", "/logo.png?v=1&r=2")
        .with_header("content-type", "image/png")
        .with_body("logo")
        .create_async()
        .await;
    server
        .mock("GET", "/hero.jpg")
        .with_header("content-type", "image/jpeg")
        .with_body("hero")
        .create_async()
        .await;
    server
        .mock("GET", "/favicon.ico")
        .with_header("content-type", "image/x-icon")
        .with_body("icon")
        .create_async()
        .await;

    let html = format!(
        "<html><head><link rel=\"icon\" href=\"{base}/favicon.ico\"></head>\
         <body><img src=\"/logo.png?v=1&amp;r=2\"><img src=\"{base}/hero.jpg\"></body></html>"
    );
    let manifest = ResourceManifest {
        stylesheet_urls: vec![format!("{base}/theme.css")],
        image_urls: vec![format!("{base}/logo.png?v=1&r=2")],
        favicon_urls: vec![format!("{base}/favicon.ico")],
    };

    let archiver = Archiver::new(FetchLimits::default());
    let artifact = archiver.build(&html, &manifest, &base).await.expect("build");

    assert!(artifact.contains("<style data-source="));
    assert!(artifact.contains("color: teal"));
    assert!(artifact.contains("data:image/png;base64,"));
    assert!(artifact.contains("data:image/jpeg;base64,"));
    assert!(artifact.contains("data:image/x-icon;base64,"));
    // data-source provenance on <style> blocks is the only place the origin
    // may still appear.
    assert!(
        !artifact.contains(&format!("src=\"{base}")),
        "outbound src survived in artifact"
    );
    assert!(
        !artifact.contains(&format!("href=\"{base}")),
        "outbound href survived in artifact"
    );
}

#[tokio::test]
async fn rebuild_with_empty_manifest_is_byte_identical() {
    let mut server = mockito::Server::new_async().await;
    let base = server.url();

    server
        .mock("GET", "/s.css")
        .with_header("content-type", "text/css")
        .with_body("body { background: url(bg.gif); }")
        .create_async()
        .await;
    server
        .mock("GET", "/bg.gif")
        .with_header("content-type", "image/gif")
        .with_body("gif")
        .create_async()
        .await;
    server
        .mock("GET", "/pic.png")
        .with_header("content-type", "image/png")
        .with_body("pic")
        .create_async()
        .await;

    let html = format!("<html><head></head><body><img src=\"{base}/pic.png\"></body></html>");
    let manifest = ResourceManifest {
        stylesheet_urls: vec![format!("{base}/s.css")],
        image_urls: vec![],
        favicon_urls: vec![],
    };

    let archiver = Archiver::new(FetchLimits::default());
    let first = archiver.build(&html, &manifest, &base).await.expect("build");

    let second_pass = Archiver::new(FetchLimits::default());
    let second = second_pass
        .build(&first, &ResourceManifest::default(), &base)
        .await
        .expect("rebuild");

    assert_eq!(first, second);
}

#[tokio::test]
async fn single_quoted_inline_styles_are_swept() {
    let mut server = mockito::Server::new_async().await;
    let base = server.url();

    server
        .mock("GET", "/tile.png")
        .with_header("content-type", "image/png")
        .with_body("tile")
        .create_async()
        .await;

    let html = format!(
        "<html><body><div style='background: url({base}/tile.png)'>x</div></body></html>"
    );
    let archiver = Archiver::new(FetchLimits::default());
    let artifact = archiver
        .build(&html, &ResourceManifest::default(), &base)
        .await
        .expect("build");

    assert!(artifact.contains("url(\"data:image/png;base64,"));
    assert!(!artifact.contains("tile.png"));
}

#[tokio::test]
async fn failed_image_is_blanked_not_left_pointing_out() {
    let mut server = mockito::Server::new_async().await;
    let base = server.url();

    server
        .mock("GET", "/broken.png")
        .with_status(500)
        .create_async()
        .await;

    let html = format!("<html><body><img src=\"{base}/broken.png\"></body></html>");
    let archiver = Archiver::new(FetchLimits::default());
    let artifact = archiver
        .build(&html, &ResourceManifest::default(), &base)
        .await
        .expect("build");

    assert!(!artifact.contains("broken.png"));
    assert!(artifact.contains("<img src=\"\">"));
}
