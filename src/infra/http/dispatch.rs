use std::{collections::HashMap, sync::Arc};

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    response::{IntoResponse, Response},
};
use tracing::{debug, instrument};

use crate::{
    application::{
        error::AppError,
        handler::{HandlerOutput, HandlerRequest},
    },
    routing::CleanPath,
};

use super::HttpState;

const MAX_FORM_BYTES: usize = 64 * 1024;
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

#[instrument(skip_all, fields(method = %request.method(), uri = %request.uri()))]
pub(super) async fn dispatch(State(state): State<HttpState>, request: Request<Body>) -> Response {
    match dispatch_request(state, request).await {
        Ok(output) => output.into_response(),
        Err(err) => err.into_response(),
    }
}

async fn dispatch_request(
    state: HttpState,
    request: Request<Body>,
) -> Result<HandlerOutput, AppError> {
    let (parts, body) = request.into_parts();

    let path = CleanPath::parse(parts.uri.path(), &*state.reserved_prefixes)?;
    let route = state
        .resolver
        .resolve(&path)
        .into_route()
        .ok_or(AppError::NotFound)?;
    let handler = state
        .registry
        .get(&route.handler)
        .ok_or(AppError::NotFound)?;

    let uri = parts
        .uri
        .path_and_query()
        .map(|path_and_query| path_and_query.as_str().to_string())
        .unwrap_or_else(|| parts.uri.path().to_string());

    let is_form = parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with(FORM_CONTENT_TYPE));
    let form = if is_form {
        read_form(body).await?
    } else {
        HashMap::new()
    };

    debug!(handler = %route.handler, fields = form.len(), "dispatching");

    handler
        .handle(HandlerRequest {
            method: parts.method,
            uri,
            arguments: route.arguments,
            form,
            tracker: Arc::clone(&state.tracker),
        })
        .await
}

async fn read_form(body: Body) -> Result<HashMap<String, String>, AppError> {
    let bytes = axum::body::to_bytes(body, MAX_FORM_BYTES)
        .await
        .map_err(|err| AppError::validation(format!("failed to read form body: {err}")))?;
    Ok(url::form_urlencoded::parse(&bytes).into_owned().collect())
}
