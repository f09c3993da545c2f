//! Request path cleaning.

use std::fmt;

use thiserror::Error;

use crate::domain::keys::PageKey;

/// Characters stripped from every request path before resolution.
const UNSAFE_CHARS: &[char] = &['\\', ':', '*', '<', '>', '|', '"'];

/// Traversal spellings rejected as a whole segment, compared ASCII
/// case-insensitively.
const TRAVERSAL_SEGMENTS: &[&str] = &["..", "%2e%2e", ".%2e", "%2e."];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("upper directory traversal is not allowed")]
    Traversal,
    #[error("access to reserved prefix `/{prefix}` is forbidden")]
    Reserved { prefix: String },
}

/// A request path with the query removed, unsafe characters stripped and no
/// leading or trailing `/`. The empty path addresses the site root.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CleanPath(String);

impl CleanPath {
    pub fn parse<S: AsRef<str>>(raw: &str, reserved_prefixes: &[S]) -> Result<Self, PathError> {
        let path = raw.split(['?', '#']).next().unwrap_or_default();

        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        if segments.iter().any(|segment| {
            TRAVERSAL_SEGMENTS
                .iter()
                .any(|traversal| segment.eq_ignore_ascii_case(traversal))
        }) {
            return Err(PathError::Traversal);
        }

        if let Some(first) = segments.first() {
            if let Some(prefix) = reserved_prefixes
                .iter()
                .map(AsRef::as_ref)
                .find(|prefix| first.eq_ignore_ascii_case(prefix.trim_matches('/')))
            {
                return Err(PathError::Reserved {
                    prefix: prefix.trim_matches('/').to_string(),
                });
            }
        }

        let cleaned = segments
            .iter()
            .map(|segment| segment.replace(UNSAFE_CHARS, ""))
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>()
            .join("/");

        Ok(Self(cleaned))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Page cache key for this path: `/`, or the path wrapped in slashes
    /// (`/news/42/`). Query strings never reach the key.
    pub fn page_key(&self) -> PageKey {
        if self.0.is_empty() {
            PageKey::from("/")
        } else {
            PageKey::new(format!("/{}/", self.0))
        }
    }

    pub fn segments(&self) -> Vec<&str> {
        if self.0.is_empty() {
            Vec::new()
        } else {
            self.0.split('/').collect()
        }
    }
}

impl fmt::Display for CleanPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESERVED: &[&str] = &["system"];

    fn clean(raw: &str) -> Result<CleanPath, PathError> {
        CleanPath::parse(raw, RESERVED)
    }

    #[test]
    fn strips_query_and_surrounding_slashes() {
        let path = clean("/news/42/?page=2").expect("clean path");
        assert_eq!(path.as_str(), "news/42");
        assert_eq!(path.segments(), ["news", "42"]);
    }

    #[test]
    fn removes_unsafe_characters() {
        let path = clean("/ne<ws>/a:b*c|\"d\\").expect("clean path");
        assert_eq!(path.as_str(), "news/abcd");
    }

    #[test]
    fn empty_and_root_paths_have_no_segments() {
        for raw in ["", "/", "//", "/?q=1"] {
            let path = clean(raw).expect("clean path");
            assert!(path.is_empty(), "{raw:?} should clean to the root");
            assert!(path.segments().is_empty());
        }
    }

    #[test]
    fn rejects_traversal_segments() {
        assert_eq!(clean("/news/../system"), Err(PathError::Traversal));
        assert_eq!(clean("/a/%2E%2e/b"), Err(PathError::Traversal));
        assert!(clean("/news/..hidden").is_ok());
    }

    #[test]
    fn rejects_reserved_prefix_case_insensitively() {
        assert_eq!(
            clean("/System/config"),
            Err(PathError::Reserved {
                prefix: "system".to_string()
            })
        );
        assert!(clean("/news/system").is_ok());
        assert!(clean("/systems").is_ok());
    }

    #[test]
    fn page_key_is_canonical_across_slash_spellings() {
        for raw in ["/news/1", "/news/1/", "news//1", "/news/1/?page=2"] {
            let key = clean(raw).expect("clean path").page_key();
            assert_eq!(key.as_str(), "/news/1/", "{raw:?}");
        }
        assert_eq!(clean("/").expect("clean path").page_key().as_str(), "/");
    }

    #[test]
    fn display_adds_leading_slash() {
        assert_eq!(clean("news/1").expect("clean").to_string(), "/news/1");
    }
}
