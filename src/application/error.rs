use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    cache::CacheError, domain::error::DomainError, infra::error::InfraError,
    presentation::views::TemplateRenderError, routing::PathError,
};

use super::repos::RepoError;

pub const NOT_FOUND_BODY: &str = "404 Controller Not Found";

/// Error chain attached to error responses for request logging.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Path(#[from] PathError),
    #[error(transparent)]
    Render(#[from] TemplateRenderError),
    #[error("no handler matched the request path")]
    NotFound,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Domain(DomainError::NotFound { .. }) | AppError::NotFound => {
                StatusCode::NOT_FOUND
            }
            AppError::Domain(DomainError::Validation { .. }) | AppError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Path(_) => StatusCode::FORBIDDEN,
            AppError::Cache(CacheError::Configuration { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Cache(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Infra(_) | AppError::Render(_) | AppError::Unexpected(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn presentation_message(&self) -> &'static str {
        match self {
            AppError::NotFound => NOT_FOUND_BODY,
            AppError::Domain(DomainError::NotFound { .. }) => "Resource not found",
            AppError::Domain(DomainError::Validation { .. }) | AppError::Validation(_) => {
                "Request could not be processed"
            }
            AppError::Path(PathError::Traversal) => "Upper directory traversal not allowed",
            AppError::Path(PathError::Reserved { .. }) => "System path access forbidden",
            AppError::Cache(CacheError::Configuration { .. }) => "Service misconfigured",
            AppError::Cache(_) => "Cache temporarily unavailable",
            AppError::Render(err) => err.public_message,
            AppError::Infra(_) | AppError::Unexpected(_) => "Unexpected error occurred",
        }
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound => AppError::Domain(DomainError::not_found("news post")),
            RepoError::InvalidInput { message } => AppError::Validation(message),
            RepoError::Persistence(message) => AppError::Unexpected(message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.presentation_message();
        let report = ErrorReport::from_error("application::error::AppError", status, &self);
        let mut response = (status, message).into_response();
        report.attach(&mut response);
        response
    }
}
