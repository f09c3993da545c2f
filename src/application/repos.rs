//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::news::{NewComment, NewPost, NewsComment, NewsPost};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[async_trait]
pub trait NewsRepo: Send + Sync {
    /// Posts, newest first.
    async fn list_posts(&self) -> Result<Vec<NewsPost>, RepoError>;

    async fn find_post(&self, id: u64) -> Result<Option<NewsPost>, RepoError>;

    /// Comments on `post`, oldest first.
    async fn comments_for(&self, post: u64) -> Result<Vec<NewsComment>, RepoError>;

    async fn create_post(&self, post: NewPost) -> Result<NewsPost, RepoError>;

    /// Fails with [`RepoError::NotFound`] when the parent post does not exist.
    async fn create_comment(&self, comment: NewComment) -> Result<NewsComment, RepoError>;
}
