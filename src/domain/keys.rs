//! Identifiers shared by the resolver and the cache tracker.
//!
//! A [`HandlerId`] names a handler by its logical route path, a [`DataKey`]
//! names a category of stored data, and a [`PageKey`] names one cached page
//! before the cache namespace is applied.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Mutation payload passed alongside a data key.
///
/// `Value::Null` when the write carries nothing beyond the key itself.
pub type Payload = serde_json::Value;

/// Identity of the root handler.
pub const ROOT_INDEX: &str = "index";

/// Leaf name probed when a directory-style route has no exact handler.
pub const INDEX_SEGMENT: &str = "index";

/// Normalized handler identity: lower-cased, `-` mapped to `_`, no leading or
/// trailing `/`, no empty segments.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandlerId(String);

impl HandlerId {
    pub fn new(raw: &str) -> Self {
        let normalized = raw
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(normalize_segment)
            .collect::<Vec<_>>()
            .join("/");
        Self(normalized)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root_index(&self) -> bool {
        self.0 == ROOT_INDEX
    }

    /// Directory part of an `…/index` identity; `Some("")` for the root index.
    pub fn index_base(&self) -> Option<&str> {
        if self.is_root_index() {
            return Some("");
        }
        self.0
            .strip_suffix(INDEX_SEGMENT)
            .and_then(|rest| rest.strip_suffix('/'))
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for HandlerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// ASCII lower-case a route fragment and map `-` to `_`.
///
/// Byte length is preserved, so offsets in the normalized form are valid in
/// the original.
pub fn normalize_segment(segment: &str) -> String {
    segment.to_ascii_lowercase().replace('-', "_")
}

/// Opaque name of a logical data category such as `news` or `comment`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataKey(String);

impl DataKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DataKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A cached page key before namespacing, typically the request URI (`/news/42/`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageKey(String);

impl PageKey {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Full store key: the namespace immediately followed by the page key.
    pub fn namespaced(&self, namespace: &str) -> String {
        format!("{namespace}{}", self.0)
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PageKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PageKey {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
