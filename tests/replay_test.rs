//! End-to-end replay resolution over in-memory stores.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use demoforge::error::{ReplayError, RuleError};
use demoforge::model::{
    CaptureMode, CapturedPage, HealthStatus, ObfuscationRule, PageType, Project, TagManagerConfig,
    Version, VersionStatus,
};
use demoforge::replay::ReplayResolver;
use demoforge::store::{BlobStore, Datastore, MemoryBlobStore, MemoryStore};

struct Fixture {
    store: Arc<MemoryStore>,
    blob: Arc<MemoryBlobStore>,
    project_id: Uuid,
    version_id: Uuid,
}

impl Fixture {
    fn resolver(&self) -> ReplayResolver {
        ReplayResolver::new(self.store.clone(), self.blob.clone())
    }

    async fn add_page(&self, url_path: &str, synthetic_url: Option<&str>, html: &str) {
        let page = CapturedPage {
            id: Uuid::new_v4(),
            version_id: self.version_id,
            source_url: format!("https://app.acme.test/{url_path}"),
            url_path: url_path.to_string(),
            synthetic_url: synthetic_url.map(str::to_string),
            title: url_path.to_string(),
            file_size: html.len(),
            capture_mode: CaptureMode::Crawl,
            page_type: if synthetic_url.is_some() {
                PageType::State
            } else {
                PageType::Page
            },
            parent_page_id: None,
            health_status: HealthStatus::Healthy,
            created_at: Utc::now(),
        };
        self.blob
            .write(&page.artifact_path(), html.as_bytes())
            .await
            .expect("blob write");
        self.store.insert_page(page).await.expect("insert page");
    }

    fn rule(&self, ordinal: i32, search: &str, replace: &str, is_regex: bool) -> ObfuscationRule {
        ObfuscationRule {
            id: Uuid::new_v4(),
            project_id: self.project_id,
            search_term: search.to_string(),
            replace_term: replace.to_string(),
            is_regex,
            is_active: true,
            ordinal,
        }
    }
}

async fn fixture(subdomain: &str) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let project_id = Uuid::new_v4();
    let version_id = Uuid::new_v4();

    store
        .insert_project(Project {
            id: project_id,
            name: "Acme".to_string(),
            subdomain: subdomain.to_string(),
        })
        .await;
    store
        .insert_version(Version {
            id: version_id,
            project_id,
            status: VersionStatus::Active,
            created_at: Utc::now(),
        })
        .await;

    Fixture {
        store,
        blob: Arc::new(MemoryBlobStore::new()),
        project_id,
        version_id,
    }
}

const HOME_HTML: &str = "<html><head><base href=\"https://app.acme.test/\"></head>\
    <body><p>Contact Acme Corp at 0601020304</p>\
    <a href=\"https://app.acme.test/pricing\">Pricing</a>\
    <a href=\"https://elsewhere.test/\">External</a></body></html>";

#[tokio::test]
async fn missing_path_falls_back_to_home_with_rules_applied() {
    let fx = fixture("acme").await;
    fx.add_page("home", None, HOME_HTML).await;
    fx.add_page("pricing", None, "<html><body>plans</body></html>")
        .await;

    fx.store
        .create_rule(fx.rule(0, "Acme Corp", "Demo Co", false))
        .await
        .expect("datastore")
        .expect("valid rule");
    fx.store
        .create_rule(fx.rule(1, r"\d{10}", "0000000000", true))
        .await
        .expect("datastore")
        .expect("valid rule");

    let served = fx
        .resolver()
        .resolve("acme", "/does-not-exist")
        .await
        .expect("resolve");

    assert_eq!(served.url_path, "home");
    assert!(served.html.contains("Demo Co"));
    assert!(served.html.contains("0000000000"));
    assert!(!served.html.contains("Acme Corp"));
    assert!(!served.html.contains("0601020304"));
}

#[tokio::test]
async fn internal_links_are_rewritten_and_base_is_stripped() {
    let fx = fixture("acme").await;
    fx.add_page("home", None, HOME_HTML).await;
    fx.add_page("pricing", None, "<html><body>plans</body></html>")
        .await;

    let served = fx.resolver().resolve("acme", "/home").await.expect("resolve");

    assert!(served.html.contains("href=\"/demo/acme/pricing\""));
    assert!(served.html.contains("href=\"https://elsewhere.test/\""));
    assert!(!served.html.contains("<base"));
}

#[tokio::test]
async fn navigation_interceptor_and_tag_manager_are_injected() {
    let fx = fixture("acme").await;
    fx.add_page("home", None, HOME_HTML).await;
    fx.store
        .set_tag_manager(
            fx.project_id,
            TagManagerConfig {
                container_id: "GTM-TEST99".to_string(),
                is_active: true,
            },
        )
        .await;

    let served = fx.resolver().resolve("acme", "/home").await.expect("resolve");

    assert!(served.html.contains("demo:navigate"));
    assert!(served.html.contains("gtm.js?id=GTM-TEST99"));
    let body_end = served.html.rfind("</body>").expect("body tag survives");
    assert!(served.html.find("demo:navigate").expect("interceptor") < body_end);
}

#[tokio::test]
async fn inactive_tag_manager_is_not_injected() {
    let fx = fixture("acme").await;
    fx.add_page("home", None, HOME_HTML).await;
    fx.store
        .set_tag_manager(
            fx.project_id,
            TagManagerConfig {
                container_id: "GTM-OFF0000".to_string(),
                is_active: false,
            },
        )
        .await;

    let served = fx.resolver().resolve("acme", "/home").await.expect("resolve");
    assert!(!served.html.contains("GTM-OFF0000"));
}

#[tokio::test]
async fn synthetic_url_serves_spa_state() {
    let fx = fixture("acme").await;
    fx.add_page("home", None, HOME_HTML).await;
    fx.add_page(
        "reports-expanded",
        Some("state/deadbeefcafe"),
        "<html><body>expanded</body></html>",
    )
    .await;

    let served = fx
        .resolver()
        .resolve("acme", "/state/deadbeefcafe")
        .await
        .expect("resolve");
    assert_eq!(served.url_path, "reports-expanded");
}

#[tokio::test]
async fn unknown_subdomain_is_not_found() {
    let fx = fixture("acme").await;
    fx.add_page("home", None, HOME_HTML).await;

    let err = fx
        .resolver()
        .resolve("nobody", "/home")
        .await
        .expect_err("must miss");
    assert!(matches!(err, ReplayError::NotFound));
}

#[tokio::test]
async fn project_without_active_version_is_not_found() {
    let store = Arc::new(MemoryStore::new());
    let project_id = Uuid::new_v4();
    store
        .insert_project(Project {
            id: project_id,
            name: "Draft Only".to_string(),
            subdomain: "draft".to_string(),
        })
        .await;
    store
        .insert_version(Version {
            id: Uuid::new_v4(),
            project_id,
            status: VersionStatus::Draft,
            created_at: Utc::now(),
        })
        .await;

    let resolver = ReplayResolver::new(store, Arc::new(MemoryBlobStore::new()));
    let err = resolver.resolve("draft", "/").await.expect_err("must miss");
    assert!(matches!(err, ReplayError::NotFound));
}

#[tokio::test]
async fn page_with_missing_artifact_is_not_found() {
    let fx = fixture("acme").await;
    let page = CapturedPage {
        id: Uuid::new_v4(),
        version_id: fx.version_id,
        source_url: "https://app.acme.test/home".to_string(),
        url_path: "home".to_string(),
        synthetic_url: None,
        title: "home".to_string(),
        file_size: 0,
        capture_mode: CaptureMode::Crawl,
        page_type: PageType::Page,
        parent_page_id: None,
        health_status: HealthStatus::Broken,
        created_at: Utc::now(),
    };
    fx.store.insert_page(page).await.expect("insert page");

    let err = fx
        .resolver()
        .resolve("acme", "/home")
        .await
        .expect_err("must miss");
    assert!(matches!(err, ReplayError::NotFound));
}

#[tokio::test]
async fn version_with_no_pages_is_not_found() {
    let fx = fixture("acme").await;
    let err = fx.resolver().resolve("acme", "/").await.expect_err("must miss");
    assert!(matches!(err, ReplayError::NotFound));
}

#[tokio::test]
async fn unsafe_rules_are_rejected_and_never_stored() {
    let fx = fixture("acme").await;

    let script = fx.rule(0, "Acme", "<script>alert(1)</script>", false);
    let rejection = fx
        .store
        .create_rule(script)
        .await
        .expect("datastore")
        .expect_err("must reject");
    assert!(matches!(rejection, RuleError::ScriptInReplacement));

    let handler = fx.rule(1, "Acme", "<img onerror=alert(1)>", false);
    let rejection = fx
        .store
        .create_rule(handler)
        .await
        .expect("datastore")
        .expect_err("must reject");
    assert!(matches!(rejection, RuleError::EventHandlerInReplacement));

    let bad_regex = fx.rule(2, "[unclosed", "x", true);
    let rejection = fx
        .store
        .create_rule(bad_regex)
        .await
        .expect("datastore")
        .expect_err("must reject");
    assert!(matches!(rejection, RuleError::InvalidPattern(_)));

    assert_eq!(fx.store.rule_count().await, 0);
}
