//! Page cache middleware.
//!
//! Serves GET hits straight from the store and stores successful GET
//! responses on a miss, keyed by the cleaned request path. Requests with a
//! query string and bodies over the buffer limit pass through uncached.
//! Handlers opt a response out by attaching [`PageCachePolicy::Bypass`].

use std::sync::Arc;

use axum::{
    body::{Body, HttpBody},
    extract::State,
    http::{HeaderValue, Method, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use metrics::counter;
use tracing::{debug, instrument, warn};

use super::CacheTracker;
use crate::routing::CleanPath;

/// Largest response body the middleware buffers for storage.
const MAX_CACHED_BODY: usize = 4 * 1024 * 1024;

/// Response header reporting whether the page came from the cache.
pub const CACHE_STATUS_HEADER: &str = "x-tessera-cache";

/// Response extension set by handlers whose output must not be stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageCachePolicy {
    Bypass,
}

#[derive(Clone)]
pub struct PageCacheState {
    pub tracker: Arc<CacheTracker>,
    pub reserved_prefixes: Arc<[String]>,
}

#[instrument(skip_all, fields(uri = %request.uri()))]
pub async fn page_cache_layer(
    State(state): State<PageCacheState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.tracker.config().cache_content || request.method() != Method::GET {
        return next.run(request).await;
    }
    if request.uri().query().is_some() {
        debug!(cache = "page", outcome = "skip", "query string present, not caching");
        return next.run(request).await;
    }
    // Rejected paths are left to the dispatcher to answer.
    let Ok(path) = CleanPath::parse(request.uri().path(), &*state.reserved_prefixes) else {
        return next.run(request).await;
    };
    let page = path.page_key();

    if let Some(body) = state.tracker.fetch_page_async(page.clone()).await {
        counter!("tessera_page_cache_hit_total").increment(1);
        debug!(cache = "page", outcome = "hit", page = %page, "serving cached page");
        return cached_response(body);
    }

    counter!("tessera_page_cache_miss_total").increment(1);
    debug!(cache = "page", outcome = "miss", page = %page, "cache miss, dispatching");

    let response = next.run(request).await;
    if response.status() != StatusCode::OK
        || response.extensions().get::<PageCachePolicy>().is_some()
    {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let fits = body
        .size_hint()
        .upper()
        .is_some_and(|upper| upper <= MAX_CACHED_BODY as u64);
    if !fits {
        debug!(
            cache = "page",
            outcome = "skip",
            page = %page,
            limit = MAX_CACHED_BODY,
            "response body too large or unsized, not caching"
        );
        return Response::from_parts(parts, body);
    }

    let bytes = match axum::body::to_bytes(body, MAX_CACHED_BODY).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(error = %err, "failed to buffer response body for caching");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    state
        .tracker
        .store_page_async(Method::GET, page, bytes.clone())
        .await;
    parts
        .headers
        .insert(CACHE_STATUS_HEADER, HeaderValue::from_static("miss"));

    Response::from_parts(parts, Body::from(bytes))
}

fn cached_response(page: Bytes) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8"),
            (header::HeaderName::from_static(CACHE_STATUS_HEADER), "hit"),
        ],
        page,
    )
        .into_response()
}
