//! End-to-end page cache behaviour through the front controller.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use tessera::{
    application::{
        error::{AppError, NOT_FOUND_BODY},
        handler::{Handler, HandlerOutput, HandlerRequest},
        handlers::default_registry,
        registry::HandlerRegistry,
    },
    cache::{CACHE_STATUS_HEADER, CacheConfig, CacheTracker, MemoryStore},
    infra::{
        http::{HttpState, build_router},
        news_board::InMemoryNewsBoard,
    },
    routing::{RouteResolver, RouteTable},
};

struct Fixture {
    router: Router,
    store: Arc<MemoryStore>,
    _dir: TempDir,
}

/// Larger than anything the page cache is willing to buffer.
const OVERSIZED_PAGE: usize = 5 * 1024 * 1024;

struct OversizedHandler;

#[async_trait]
impl Handler for OversizedHandler {
    async fn handle(&self, _request: HandlerRequest) -> Result<HandlerOutput, AppError> {
        Ok(HandlerOutput::html("x".repeat(OVERSIZED_PAGE)))
    }
}

fn fixture(cache_content: bool, cache_route: bool) -> Fixture {
    let registry = default_registry(Arc::new(InMemoryNewsBoard::new()));
    fixture_with(registry, cache_content, cache_route)
}

fn fixture_with(registry: HandlerRegistry, cache_content: bool, cache_route: bool) -> Fixture {
    let dir = tempfile::tempdir().expect("tempdir");
    let registry = Arc::new(registry);
    let store = Arc::new(MemoryStore::new());

    let tracker = CacheTracker::new(
        CacheConfig {
            cache_content,
            dependency_snapshot_path: dir.path().join("deplist.json"),
            ..Default::default()
        },
        Arc::clone(&registry),
        store.clone(),
    )
    .expect("valid cache config");

    let mut resolver = RouteResolver::new(registry.clone(), false);
    if cache_route {
        resolver = resolver.with_table(RouteTable::load_or_build(
            &dir.path().join("route_cache.json"),
            &*registry,
        ));
    }

    let router = build_router(HttpState {
        registry,
        resolver,
        tracker: Arc::new(tracker),
        reserved_prefixes: vec!["system".to_string()].into(),
    });

    Fixture {
        router,
        store,
        _dir: dir,
    }
}

async fn get(router: &Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .expect("request should build");
    router
        .clone()
        .oneshot(request)
        .await
        .expect("router should respond")
}

async fn post_form(router: &Router, uri: &str, form: &str) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form.to_string()))
        .expect("request should build");
    router
        .clone()
        .oneshot(request)
        .await
        .expect("router should respond")
}

fn cache_status(response: &Response) -> Option<&str> {
    response
        .headers()
        .get(CACHE_STATUS_HEADER)
        .and_then(|value| value.to_str().ok())
}

async fn body_text(response: Response) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

#[tokio::test]
async fn second_get_is_served_from_the_store() {
    let fixture = fixture(true, false);

    let first = get(&fixture.router, "/news/").await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(cache_status(&first), Some("miss"));
    assert!(fixture.store.contains("tessera/news/"));

    let second = get(&fixture.router, "/news/").await;
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(cache_status(&second), Some("hit"));
    assert!(body_text(second).await.contains("<h1>News</h1>"));
}

#[tokio::test]
async fn page_key_ignores_trailing_slash_spelling() {
    let fixture = fixture(true, false);

    let first = get(&fixture.router, "/news").await;
    assert_eq!(cache_status(&first), Some("miss"));
    assert_eq!(fixture.store.keys(), ["tessera/news/"]);

    let second = get(&fixture.router, "/news/").await;
    assert_eq!(cache_status(&second), Some("hit"));
}

#[tokio::test]
async fn requests_with_a_query_string_bypass_the_cache() {
    let fixture = fixture(true, false);
    get(&fixture.router, "/news/").await;

    let response = get(&fixture.router, "/news/?page=2").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(cache_status(&response), None);
    assert_eq!(fixture.store.keys(), ["tessera/news/"]);
}

#[tokio::test]
async fn oversized_page_is_served_but_not_stored() {
    let fixture = fixture_with(HandlerRegistry::new().with("big", OversizedHandler), true, false);

    let response = get(&fixture.router, "/big/").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(cache_status(&response), None);
    assert_eq!(body_text(response).await.len(), OVERSIZED_PAGE);
    assert!(fixture.store.is_empty());
}

#[tokio::test]
async fn posting_news_evicts_the_listing() {
    let fixture = fixture(true, false);
    get(&fixture.router, "/news/").await;
    assert!(fixture.store.contains("tessera/news/"));

    let response = post_form(&fixture.router, "/news/", "title=Hello&content=First+post").await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers().get(header::LOCATION).map(|v| v.as_bytes()),
        Some(b"/news/".as_slice())
    );
    assert!(!fixture.store.contains("tessera/news/"));

    let fresh = get(&fixture.router, "/news/").await;
    assert_eq!(cache_status(&fresh), Some("miss"));
    assert!(body_text(fresh).await.contains("Hello"));
}

#[tokio::test]
async fn commenting_evicts_only_the_post_page() {
    let fixture = fixture(true, false);
    post_form(&fixture.router, "/news/", "title=Hello&content=First+post").await;

    get(&fixture.router, "/news/").await;
    let post_page = get(&fixture.router, "/news/1/").await;
    assert_eq!(post_page.status(), StatusCode::OK);
    assert!(fixture.store.contains("tessera/news/1/"));

    let response = post_form(&fixture.router, "/news/comment/", "id=1&content=Nice").await;
    assert_eq!(response.status(), StatusCode::FOUND);

    assert!(!fixture.store.contains("tessera/news/1/"));
    assert!(fixture.store.contains("tessera/news/"));

    let refreshed = get(&fixture.router, "/news/1/").await;
    assert_eq!(cache_status(&refreshed), Some("miss"));
    assert!(body_text(refreshed).await.contains("<li>Nice</li>"));
}

#[tokio::test]
async fn commenting_evicts_a_post_page_fetched_without_trailing_slash() {
    let fixture = fixture(true, false);
    post_form(&fixture.router, "/news/", "title=Hello&content=First+post").await;

    get(&fixture.router, "/news/1").await;
    assert!(fixture.store.contains("tessera/news/1/"));

    post_form(&fixture.router, "/news/comment/", "id=1&content=Fresh").await;

    let refreshed = get(&fixture.router, "/news/1").await;
    assert_eq!(cache_status(&refreshed), Some("miss"));
    assert!(body_text(refreshed).await.contains("<li>Fresh</li>"));
}

#[tokio::test]
async fn invalid_form_is_rejected_without_touching_the_cache() {
    let fixture = fixture(true, false);
    get(&fixture.router, "/news/").await;

    let response = post_form(&fixture.router, "/news/", "title=&content=").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(fixture.store.contains("tessera/news/"));
}

#[tokio::test]
async fn comment_on_missing_post_is_not_found() {
    let fixture = fixture(true, false);

    let response = post_form(&fixture.router, "/news/comment/", "id=99&content=Hi").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_path_renders_controller_not_found() {
    let fixture = fixture(true, false);

    let response = get(&fixture.router, "/nothing/here").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(cache_status(&response), None);
    assert_eq!(body_text(response).await, NOT_FOUND_BODY);
    assert!(fixture.store.is_empty());
}

#[tokio::test]
async fn reserved_and_traversal_paths_are_forbidden() {
    let fixture = fixture(true, false);

    for uri in ["/system/config", "/SYSTEM", "/news/../system", "/news/%2e%2e/x"] {
        let response = get(&fixture.router, uri).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{uri}");
    }
    assert!(fixture.store.is_empty());
}

#[tokio::test]
async fn debug_pages_are_never_cached() {
    let fixture = fixture(true, false);

    let response = get(&fixture.router, "/debug/invalidate/").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(cache_status(&response), None);
    assert!(fixture.store.is_empty());
}

#[tokio::test]
async fn debug_invalidate_evicts_pages_for_a_key() {
    let fixture = fixture(true, false);
    post_form(&fixture.router, "/news/", "title=Hello&content=Body").await;
    get(&fixture.router, "/news/1/").await;
    assert!(fixture.store.contains("tessera/news/1/"));

    let response = post_form(&fixture.router, "/debug/invalidate/", "key=comment&payload=1").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("tessera/news/1/"));
    assert!(!fixture.store.contains("tessera/news/1/"));
}

#[tokio::test]
async fn debug_delete_removes_a_raw_store_key() {
    let fixture = fixture(true, false);
    get(&fixture.router, "/news/").await;

    let response = post_form(&fixture.router, "/debug/delete/", "delete=tessera%2Fnews%2F").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("deleted"));
    assert!(fixture.store.is_empty());
}

#[tokio::test]
async fn disabled_cache_passes_everything_through() {
    let fixture = fixture(false, false);

    let first = get(&fixture.router, "/news/").await;
    let second = get(&fixture.router, "/news/").await;

    assert_eq!(cache_status(&first), None);
    assert_eq!(cache_status(&second), None);
    assert!(fixture.store.is_empty());
}

#[tokio::test]
async fn cached_routing_serves_the_same_pages() {
    let fixture = fixture(true, true);
    post_form(&fixture.router, "/news/", "title=Hello&content=Body").await;

    let post_page = get(&fixture.router, "/News/1/").await;
    assert_eq!(post_page.status(), StatusCode::OK);
    assert!(body_text(post_page).await.contains("Hello"));

    let missing = get(&fixture.router, "/inbox").await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}
