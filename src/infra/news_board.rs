//! Process-local news board backing the sample news handler.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    application::repos::{NewsRepo, RepoError},
    domain::news::{NewComment, NewPost, NewsComment, NewsPost},
};

#[derive(Debug, Default)]
struct BoardState {
    next_id: u64,
    posts: BTreeMap<u64, NewsPost>,
    comments: BTreeMap<u64, Vec<NewsComment>>,
}

#[derive(Debug, Default)]
pub struct InMemoryNewsBoard {
    state: RwLock<BoardState>,
}

impl InMemoryNewsBoard {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NewsRepo for InMemoryNewsBoard {
    async fn list_posts(&self) -> Result<Vec<NewsPost>, RepoError> {
        let state = self.state.read().await;
        Ok(state.posts.values().rev().cloned().collect())
    }

    async fn find_post(&self, id: u64) -> Result<Option<NewsPost>, RepoError> {
        Ok(self.state.read().await.posts.get(&id).cloned())
    }

    async fn comments_for(&self, post: u64) -> Result<Vec<NewsComment>, RepoError> {
        let state = self.state.read().await;
        Ok(state.comments.get(&post).cloned().unwrap_or_default())
    }

    async fn create_post(&self, post: NewPost) -> Result<NewsPost, RepoError> {
        let mut state = self.state.write().await;
        state.next_id += 1;
        let record = NewsPost {
            id: state.next_id,
            title: post.title,
            content: post.content,
        };
        state.posts.insert(record.id, record.clone());
        Ok(record)
    }

    async fn create_comment(&self, comment: NewComment) -> Result<NewsComment, RepoError> {
        let mut state = self.state.write().await;
        if !state.posts.contains_key(&comment.parent) {
            return Err(RepoError::NotFound);
        }
        let record = NewsComment {
            parent: comment.parent,
            content: comment.content,
        };
        state
            .comments
            .entry(record.parent)
            .or_default()
            .push(record.clone());
        Ok(record)
    }
}
