//! Handler registry: the static set of handlers known to the process.
//!
//! Built once at startup and shared read-only afterwards. The resolver only
//! needs the identities; the cache tracker walks the cacheable subset.

use std::{collections::BTreeMap, sync::Arc};

use crate::{domain::keys::HandlerId, routing::HandlerCatalog};

use super::handler::{Cacheable, Handler};

#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: BTreeMap<HandlerId, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under the normalized form of `id`.
    pub fn with<H>(mut self, id: &str, handler: H) -> Self
    where
        H: Handler + 'static,
    {
        self.insert(id, Arc::new(handler));
        self
    }

    pub fn insert(&mut self, id: &str, handler: Arc<dyn Handler>) {
        self.handlers.insert(HandlerId::new(id), handler);
    }

    pub fn get(&self, id: &HandlerId) -> Option<Arc<dyn Handler>> {
        self.handlers.get(id).cloned()
    }

    /// Handlers that expose the cache capability, in identity order.
    pub fn cacheable(&self) -> impl Iterator<Item = (&HandlerId, &dyn Cacheable)> {
        self.handlers
            .iter()
            .filter_map(|(id, handler)| handler.cacheable().map(|cacheable| (id, cacheable)))
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl HandlerCatalog for HandlerRegistry {
    fn contains(&self, id: &str) -> bool {
        self.handlers.contains_key(&HandlerId::new(id))
    }

    fn identities(&self) -> Vec<HandlerId> {
        self.handlers.keys().cloned().collect()
    }
}
