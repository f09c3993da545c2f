//! Operator forms for poking the page cache by hand. Never cached.

use async_trait::async_trait;
use tracing::warn;

use crate::{
    application::{
        error::AppError,
        handler::{Handler, HandlerOutput, HandlerRequest},
    },
    cache::Mutations,
    domain::keys::{DataKey, Payload},
    presentation::views::{
        DeleteKeyTemplate, DeletionView, InvalidateTemplate, InvalidationView, render_template,
    },
};

/// Fires a single data key mutation through the tracker.
pub struct InvalidateHandler;

#[async_trait]
impl Handler for InvalidateHandler {
    async fn handle(&self, request: HandlerRequest) -> Result<HandlerOutput, AppError> {
        let key = request
            .field("key")
            .map(str::trim)
            .filter(|key| !key.is_empty());

        let mut result = None;
        if request.is_mutation() {
            if let Some(key) = key {
                let payload = parse_payload(request.field("payload").unwrap_or_default());
                let mutations = Mutations::single(DataKey::new(key), payload);
                let report = request.tracker.invalidate_async(mutations).await?;
                result = Some(InvalidationView {
                    key: key.to_string(),
                    removed: report.removed,
                    store_keys: report.keys,
                });
            }
        }

        let body = render_template(InvalidateTemplate { result })?;
        Ok(HandlerOutput::html(body).uncached())
    }
}

/// Deletes one raw store key.
pub struct DeleteKeyHandler;

#[async_trait]
impl Handler for DeleteKeyHandler {
    async fn handle(&self, request: HandlerRequest) -> Result<HandlerOutput, AppError> {
        let key = request
            .field("delete")
            .map(str::trim)
            .filter(|key| !key.is_empty());

        let mut result = None;
        if request.is_mutation() {
            if let Some(key) = key {
                let outcome = match request.tracker.delete_key_async(key.to_string()).await {
                    Ok(true) => "deleted",
                    Ok(false) => "was not cached",
                    Err(err) => {
                        warn!(key, error = %err, "cache key delete failed");
                        "could not be deleted"
                    }
                };
                result = Some(DeletionView {
                    key: key.to_string(),
                    outcome,
                });
            }
        }

        let body = render_template(DeleteKeyTemplate { result })?;
        Ok(HandlerOutput::html(body).uncached())
    }
}

/// Form payloads are JSON when they parse as JSON, plain strings otherwise.
pub fn parse_payload(raw: &str) -> Payload {
    let raw = raw.trim();
    if raw.is_empty() {
        return Payload::Null;
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Payload::String(raw.to_string()))
}
