//! Page templates for the built-in handlers.

use askama::{Error as AskamaError, Template};
use thiserror::Error;

use crate::domain::news::{NewsComment, NewsPost};

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(public_message: &'static str, error: AskamaError) -> Self {
        Self {
            public_message,
            error,
        }
    }
}

pub fn render_template<T: Template>(template: T) -> Result<String, TemplateRenderError> {
    template
        .render()
        .map_err(|err| TemplateRenderError::new("Template rendering failed", err))
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    /// Path routed to the root page without a handler of its own.
    pub unmatched: Option<String>,
}

#[derive(Template)]
#[template(path = "news_list.html")]
pub struct NewsListTemplate<'a> {
    pub posts: &'a [NewsPost],
}

#[derive(Template)]
#[template(path = "news_post.html")]
pub struct NewsPostTemplate<'a> {
    pub post: &'a NewsPost,
    pub comments: &'a [NewsComment],
    pub comment_action: &'a str,
}

pub struct InvalidationView {
    pub key: String,
    pub removed: usize,
    pub store_keys: Vec<String>,
}

#[derive(Template)]
#[template(path = "debug_invalidate.html")]
pub struct InvalidateTemplate {
    pub result: Option<InvalidationView>,
}

pub struct DeletionView {
    pub key: String,
    pub outcome: &'static str,
}

#[derive(Template)]
#[template(path = "debug_delete.html")]
pub struct DeleteKeyTemplate {
    pub result: Option<DeletionView>,
}
