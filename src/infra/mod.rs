//! Infrastructure adapters and runtime bootstrap.

pub mod error;
pub mod http;
pub mod memcached;
pub mod news_board;
pub mod snapshot;
pub mod telemetry;
