//! News posts and comments used by the sample news handler.

use serde::Serialize;

use super::error::DomainError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewsPost {
    pub id: u64,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewsComment {
    pub parent: u64,
    pub content: String,
}

/// Validated input for a new post.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub content: String,
}

impl NewPost {
    pub fn parse(title: Option<&str>, content: Option<&str>) -> Result<Self, DomainError> {
        let title = non_blank(title, "title")?;
        let content = non_blank(content, "content")?;
        Ok(Self { title, content })
    }
}

/// Validated input for a new comment.
#[derive(Debug, Clone)]
pub struct NewComment {
    pub parent: u64,
    pub content: String,
}

impl NewComment {
    pub fn parse(parent: Option<&str>, content: Option<&str>) -> Result<Self, DomainError> {
        let parent = non_blank(parent, "id")?
            .parse::<u64>()
            .map_err(|_| DomainError::validation("`id` must be a positive integer"))?;
        let content = non_blank(content, "content")?;
        Ok(Self { parent, content })
    }
}

fn non_blank(value: Option<&str>, field: &str) -> Result<String, DomainError> {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        _ => Err(DomainError::validation(format!("`{field}` must not be empty"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_post_requires_title_and_content() {
        assert!(NewPost::parse(Some("Hello"), Some("World")).is_ok());
        assert!(NewPost::parse(Some("  "), Some("World")).is_err());
        assert!(NewPost::parse(Some("Hello"), None).is_err());
    }

    #[test]
    fn new_comment_parses_parent_id() {
        let comment = NewComment::parse(Some("42"), Some("nice")).expect("valid comment");
        assert_eq!(comment.parent, 42);
        assert!(NewComment::parse(Some("abc"), Some("nice")).is_err());
        assert!(NewComment::parse(None, Some("nice")).is_err());
    }
}
