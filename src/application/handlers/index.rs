use async_trait::async_trait;

use crate::{
    application::{
        error::AppError,
        handler::{Handler, HandlerOutput, HandlerRequest},
    },
    presentation::views::{IndexTemplate, render_template},
};

pub struct IndexHandler;

#[async_trait]
impl Handler for IndexHandler {
    async fn handle(&self, request: HandlerRequest) -> Result<HandlerOutput, AppError> {
        if request.arguments.is_empty() {
            let body = render_template(IndexTemplate { unmatched: None })?;
            return Ok(HandlerOutput::html(body));
        }

        // Unmatched paths routed here; keep them out of the page cache.
        let body = render_template(IndexTemplate {
            unmatched: Some(request.arguments.as_slice().join("/")),
        })?;
        Ok(HandlerOutput::html(body).uncached())
    }
}
