//! Handler boundary: what a routed request hands to application code, and the
//! optional cache capability a handler can expose.

use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

use async_trait::async_trait;
use axum::{
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::{
    cache::{CacheTracker, PageCachePolicy},
    domain::{
        arguments::Arguments,
        keys::{DataKey, PageKey, Payload},
    },
};

use super::error::AppError;

/// Cache metadata a handler declares about itself.
///
/// `reads` feeds the dependency index; `invalidates` turns one mutation into
/// the concrete page keys the handler renders from that data.
pub trait Cacheable: Send + Sync {
    fn reads(&self) -> BTreeSet<DataKey>;

    fn invalidates(&self, key: &DataKey, payload: &Payload) -> Vec<PageKey>;
}

#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, request: HandlerRequest) -> Result<HandlerOutput, AppError>;

    /// Capability query used when the dependency index is built.
    fn cacheable(&self) -> Option<&dyn Cacheable> {
        None
    }
}

/// A resolved request as seen by a handler.
pub struct HandlerRequest {
    pub method: Method,
    /// Path and query exactly as received.
    pub uri: String,
    pub arguments: Arguments,
    pub form: HashMap<String, String>,
    pub tracker: Arc<CacheTracker>,
}

impl HandlerRequest {
    pub fn is_mutation(&self) -> bool {
        !matches!(self.method, Method::GET | Method::HEAD)
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.form.get(name).map(String::as_str)
    }
}

/// Rendered handler result.
#[derive(Debug, Clone)]
pub struct HandlerOutput {
    pub status: StatusCode,
    pub body: String,
    pub location: Option<String>,
    pub cache: bool,
}

impl HandlerOutput {
    pub fn html(body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            body: body.into(),
            location: None,
            cache: true,
        }
    }

    pub fn redirect(location: impl Into<String>) -> Self {
        let location = location.into();
        Self {
            status: StatusCode::FOUND,
            body: format!("Redirecting to {location}"),
            location: Some(location),
            cache: false,
        }
    }

    /// Keep this response out of the page cache.
    pub fn uncached(mut self) -> Self {
        self.cache = false;
        self
    }
}

impl IntoResponse for HandlerOutput {
    fn into_response(self) -> Response {
        let mut response = (
            self.status,
            [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
            self.body,
        )
            .into_response();

        if let Some(value) = self
            .location
            .as_deref()
            .and_then(|location| HeaderValue::from_str(location).ok())
        {
            response.headers_mut().insert(header::LOCATION, value);
        }

        if !self.cache {
            response.extensions_mut().insert(PageCachePolicy::Bypass);
        }

        response
    }
}
