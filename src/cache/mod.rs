//! Full-page cache with declarative invalidation.
//!
//! Handlers declare the data keys they read and, for a given mutation, the
//! page keys they render from it. [`CacheTracker`] turns those declarations
//! into a persisted reverse index and evicts the affected pages on write.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! cache_content = true
//! namespace = "tessera"
//! backend = "memcached"
//! server_ip = "127.0.0.1"
//! server_port = 11211
//! ```

mod config;
pub mod deps;
mod lock;
mod middleware;
mod store;
mod tracker;

use thiserror::Error;

pub use config::{CacheConfig, MIN_SERVER_PORT, StoreBackend};
pub use deps::DependencyIndex;
pub use middleware::{CACHE_STATUS_HEADER, PageCachePolicy, PageCacheState, page_cache_layer};
pub use store::{MemoryStore, PageStore, StoreError};
pub use tracker::{CacheTracker, InvalidationReport, Mutations};

pub(crate) use lock::{rw_read, rw_write};

use crate::infra::snapshot::SnapshotError;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache configuration error: {message}")]
    Configuration { message: String },
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("cache task `{operation}` did not complete: {message}")]
    Task {
        operation: &'static str,
        message: String,
    },
}

impl CacheError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn task(operation: &'static str, message: impl ToString) -> Self {
        Self::Task {
            operation,
            message: message.to_string(),
        }
    }
}
