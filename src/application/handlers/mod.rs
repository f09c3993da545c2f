//! Handlers shipped with the server: the root page, the news board and the
//! cache debugging forms.

mod debug;
mod index;
mod news;

use std::sync::Arc;

pub use debug::{DeleteKeyHandler, InvalidateHandler, parse_payload};
pub use index::IndexHandler;
pub use news::NewsHandler;

use super::{registry::HandlerRegistry, repos::NewsRepo};

/// Registry with every built-in handler under its route identity.
pub fn default_registry(news: Arc<dyn NewsRepo>) -> HandlerRegistry {
    HandlerRegistry::new()
        .with("index", IndexHandler)
        .with("news", NewsHandler::new(news))
        .with("debug/invalidate", InvalidateHandler)
        .with("debug/delete", DeleteKeyHandler)
}
