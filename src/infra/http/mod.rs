mod dispatch;
mod middleware;

use std::sync::Arc;

use axum::{Router, middleware as axum_middleware};

use crate::{
    application::registry::HandlerRegistry,
    cache::{CacheTracker, PageCacheState, page_cache_layer},
    routing::RouteResolver,
};

use self::middleware::{log_responses, set_request_context};

pub use middleware::{REQUEST_ID_HEADER, RequestContext};

/// Shared state for the front controller.
#[derive(Clone)]
pub struct HttpState {
    pub registry: Arc<HandlerRegistry>,
    pub resolver: RouteResolver,
    pub tracker: Arc<CacheTracker>,
    pub reserved_prefixes: Arc<[String]>,
}

/// Every path goes through the fallback dispatcher; the page cache wraps it
/// so hits never reach resolution.
pub fn build_router(state: HttpState) -> Router {
    let cache_state = PageCacheState {
        tracker: Arc::clone(&state.tracker),
        reserved_prefixes: Arc::clone(&state.reserved_prefixes),
    };

    Router::new()
        .fallback(dispatch::dispatch)
        .layer(axum_middleware::from_fn_with_state(
            cache_state,
            page_cache_layer,
        ))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
