//! News board: a listing at `/news/`, one page per post at `/news/{id}/`.
//!
//! Both pages are cached. Creating a post evicts the listing; commenting
//! evicts the post page it belongs to.

use std::{collections::BTreeSet, sync::Arc};

use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

use crate::{
    application::{
        error::AppError,
        handler::{Cacheable, Handler, HandlerOutput, HandlerRequest},
        repos::NewsRepo,
    },
    cache::Mutations,
    domain::{
        error::DomainError,
        keys::{DataKey, PageKey, Payload},
        news::{NewComment, NewPost},
    },
    presentation::views::{NewsListTemplate, NewsPostTemplate, render_template},
};

const NEWS_KEY: &str = "news";
const COMMENT_KEY: &str = "comment";
const COMMENT_ACTION: &str = "comment";

pub struct NewsHandler {
    repo: Arc<dyn NewsRepo>,
}

impl NewsHandler {
    pub fn new(repo: Arc<dyn NewsRepo>) -> Self {
        Self { repo }
    }

    async fn list_posts(&self) -> Result<HandlerOutput, AppError> {
        let posts = self.repo.list_posts().await?;
        let body = render_template(NewsListTemplate { posts: &posts })?;
        Ok(HandlerOutput::html(body))
    }

    async fn show_post(&self, id: u64) -> Result<HandlerOutput, AppError> {
        let post = self
            .repo
            .find_post(id)
            .await?
            .ok_or_else(|| DomainError::not_found("news post"))?;
        let comments = self.repo.comments_for(id).await?;
        let body = render_template(NewsPostTemplate {
            post: &post,
            comments: &comments,
            comment_action: COMMENT_ACTION,
        })?;
        Ok(HandlerOutput::html(body))
    }

    async fn post_news(&self, request: &HandlerRequest) -> Result<HandlerOutput, AppError> {
        let post = NewPost::parse(request.field("title"), request.field("content"))?;
        let post = self.repo.create_post(post).await?;
        info!(post = post.id, "news post created");

        invalidate(request, Mutations::single(NEWS_KEY, Payload::Null)).await;
        Ok(HandlerOutput::redirect("/news/"))
    }

    async fn post_comment(&self, request: &HandlerRequest) -> Result<HandlerOutput, AppError> {
        let comment = NewComment::parse(request.field("id"), request.field("content"))?;
        let comment = self.repo.create_comment(comment).await?;
        info!(post = comment.parent, "news comment created");

        invalidate(request, Mutations::single(COMMENT_KEY, json!(comment.parent))).await;
        Ok(HandlerOutput::redirect(format!("/news/{}/", comment.parent)))
    }
}

impl Cacheable for NewsHandler {
    fn reads(&self) -> BTreeSet<DataKey> {
        BTreeSet::from([DataKey::from(NEWS_KEY), DataKey::from(COMMENT_KEY)])
    }

    fn invalidates(&self, key: &DataKey, payload: &Payload) -> Vec<PageKey> {
        match key.as_str() {
            NEWS_KEY => vec![PageKey::from("/news/")],
            COMMENT_KEY => post_id(payload)
                .map(|id| vec![PageKey::new(format!("/news/{id}/"))])
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }
}

#[async_trait]
impl Handler for NewsHandler {
    async fn handle(&self, request: HandlerRequest) -> Result<HandlerOutput, AppError> {
        if request.is_mutation() {
            return if request.arguments.get(0) == Some(COMMENT_ACTION) {
                self.post_comment(&request).await
            } else {
                self.post_news(&request).await
            };
        }

        match request.arguments.get(0).and_then(|id| id.parse::<u64>().ok()) {
            Some(id) => self.show_post(id).await,
            None => self.list_posts().await,
        }
    }

    fn cacheable(&self) -> Option<&dyn Cacheable> {
        Some(self)
    }
}

/// Post id carried by a comment payload, as a number or a numeric string.
fn post_id(payload: &Payload) -> Option<String> {
    match payload {
        Payload::Number(id) => Some(id.to_string()),
        Payload::String(id) if !id.trim().is_empty() => Some(id.trim().to_string()),
        _ => None,
    }
}

async fn invalidate(request: &HandlerRequest, mutations: Mutations) {
    if let Err(err) = request.tracker.invalidate_async(mutations).await {
        warn!(error = %err, "invalidation did not run; cached pages may be stale");
    }
}
