//! Page store boundary.
//!
//! Calls are synchronous; async callers move them onto the blocking pool.

use std::{collections::HashMap, sync::RwLock};

use bytes::Bytes;
use thiserror::Error;
use tracing::warn;

use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to connect to cache server `{endpoint}`: {message}")]
    Connect { endpoint: String, message: String },
    #[error("cache `{operation}` failed: {message}")]
    Operation {
        operation: &'static str,
        message: String,
    },
}

impl StoreError {
    pub fn connect(endpoint: impl Into<String>, message: impl ToString) -> Self {
        Self::Connect {
            endpoint: endpoint.into(),
            message: message.to_string(),
        }
    }

    pub fn operation(operation: &'static str, message: impl ToString) -> Self {
        Self::Operation {
            operation,
            message: message.to_string(),
        }
    }
}

/// Key/value store holding rendered pages under fully namespaced keys.
pub trait PageStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError>;

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Returns whether the key was present. Deleting an absent key is not an
    /// error.
    fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Delete every key, returning how many were present.
    ///
    /// A failing key does not stop the others; the first error is returned
    /// once every key has been attempted.
    fn delete_many(&self, keys: &[String]) -> Result<usize, StoreError> {
        let mut removed = 0;
        let mut first_error = None;
        for key in keys {
            match self.delete(key) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(err) => {
                    warn!(key = %key, error = %err, "page delete failed");
                    first_error.get_or_insert(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(removed),
        }
    }

    fn backend(&self) -> &'static str;
}

/// Process-local store with the same contract as the memcached backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Bytes>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        rw_read(&self.entries, SOURCE, "is_empty").is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        rw_read(&self.entries, SOURCE, "contains").contains_key(key)
    }

    /// Stored keys in sorted order.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = rw_read(&self.entries, SOURCE, "keys")
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }
}

impl PageStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        Ok(rw_read(&self.entries, SOURCE, "get").get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        rw_write(&self.entries, SOURCE, "set")
            .insert(key.to_string(), Bytes::copy_from_slice(value));
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(rw_write(&self.entries, SOURCE, "delete").remove(key).is_some())
    }

    fn delete_many(&self, keys: &[String]) -> Result<usize, StoreError> {
        let mut entries = rw_write(&self.entries, SOURCE, "delete_many");
        Ok(keys
            .iter()
            .filter(|key| entries.remove(key.as_str()).is_some())
            .count())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
