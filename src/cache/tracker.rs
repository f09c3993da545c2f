//! Cache dependency tracker.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Arc, RwLock},
    time::Instant,
};

use axum::http::Method;
use bytes::Bytes;
use metrics::{counter, histogram};
use tracing::{debug, info, warn};

use crate::{
    application::registry::HandlerRegistry,
    domain::keys::{DataKey, HandlerId, PageKey, Payload},
};

use super::{
    CacheConfig, CacheError, DependencyIndex, PageStore,
    lock::{rw_read, rw_write},
};

const SOURCE: &str = "cache::tracker";

/// Data keys written by one operation, each with its payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mutations(BTreeMap<DataKey, Payload>);

impl Mutations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(key: impl Into<DataKey>, payload: Payload) -> Self {
        Self::new().with(key, payload)
    }

    pub fn with(mut self, key: impl Into<DataKey>, payload: Payload) -> Self {
        self.0.insert(key.into(), payload);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DataKey, &Payload)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl FromIterator<(DataKey, Payload)> for Mutations {
    fn from_iter<I: IntoIterator<Item = (DataKey, Payload)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// What one invalidation touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationReport {
    /// Handlers registered under any of the mutated keys.
    pub handlers: BTreeSet<HandlerId>,
    /// Namespaced store keys sent for deletion, deduplicated and sorted.
    pub keys: Vec<String>,
    /// How many of `keys` were present in the store.
    pub removed: usize,
}

/// Owns the cache settings, the handler registry view and the lazily loaded
/// dependency index. Shared by `Arc` between the HTTP layer and handlers.
pub struct CacheTracker {
    config: CacheConfig,
    registry: Arc<HandlerRegistry>,
    store: Arc<dyn PageStore>,
    index: RwLock<Option<Arc<DependencyIndex>>>,
}

impl CacheTracker {
    /// Fails with [`CacheError::Configuration`] before any cache operation
    /// when the namespace or server endpoint is invalid.
    pub fn new(
        config: CacheConfig,
        registry: Arc<HandlerRegistry>,
        store: Arc<dyn PageStore>,
    ) -> Result<Self, CacheError> {
        config.validate()?;
        Ok(Self {
            config,
            registry,
            store,
            index: RwLock::new(None),
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn namespace(&self) -> &str {
        &self.config.namespace
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    pub fn store_key(&self, page: &PageKey) -> String {
        page.namespaced(self.namespace())
    }

    /// Rebuild the index from the registry, persist it and make it current.
    pub fn build_index(&self) -> Result<Arc<DependencyIndex>, CacheError> {
        let index = Arc::new(DependencyIndex::build(&self.registry));
        index.persist(&self.config.dependency_snapshot_path)?;
        *rw_write(&self.index, SOURCE, "build_index") = Some(Arc::clone(&index));

        info!(
            path = %self.config.dependency_snapshot_path.display(),
            data_keys = index.len(),
            "dependency index rebuilt"
        );
        Ok(index)
    }

    /// The current index, loading or rebuilding the snapshot on first use.
    pub fn index(&self) -> Arc<DependencyIndex> {
        if let Some(index) = rw_read(&self.index, SOURCE, "index").as_ref() {
            return Arc::clone(index);
        }

        let mut slot = rw_write(&self.index, SOURCE, "index_bootstrap");
        if let Some(index) = slot.as_ref() {
            return Arc::clone(index);
        }
        let index = Arc::new(self.load_or_rebuild());
        *slot = Some(Arc::clone(&index));
        index
    }

    fn load_or_rebuild(&self) -> DependencyIndex {
        let path = &self.config.dependency_snapshot_path;
        match DependencyIndex::load(path) {
            Ok(Some(index)) => {
                debug!(path = %path.display(), data_keys = index.len(), "dependency snapshot loaded");
                return index;
            }
            Ok(None) => {
                warn!(path = %path.display(), "dependency snapshot missing, rebuilding");
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "dependency snapshot unreadable, rebuilding");
            }
        }

        let index = DependencyIndex::build(&self.registry);
        if let Err(err) = index.persist(path) {
            warn!(
                path = %path.display(),
                error = %err,
                "failed to persist dependency snapshot; continuing with in-memory index"
            );
        }
        index
    }

    /// Evict every cached page the mutated keys affect.
    ///
    /// Store failures are logged and reported as zero removals.
    pub fn invalidate(&self, mutations: &Mutations) -> InvalidationReport {
        let started = Instant::now();
        let mut report = InvalidationReport::default();

        let index = self.index();
        if index.is_empty() || mutations.is_empty() {
            return report;
        }

        for (key, _) in mutations.iter() {
            report.handlers.extend(index.handlers_for(key).cloned());
        }

        let mut pages: BTreeSet<PageKey> = BTreeSet::new();
        for id in &report.handlers {
            let Some(handler) = self.registry.get(id) else {
                debug!(handler = %id, "indexed handler no longer registered");
                continue;
            };
            let Some(cacheable) = handler.cacheable() else {
                continue;
            };
            for (key, payload) in mutations.iter() {
                pages.extend(cacheable.invalidates(key, payload));
            }
        }

        report.keys = pages
            .iter()
            .map(|page| page.namespaced(self.namespace()))
            .collect();

        if !report.keys.is_empty() {
            match self.store.delete_many(&report.keys) {
                Ok(removed) => {
                    report.removed = removed;
                    counter!("tessera_page_cache_evict_total").increment(removed as u64);
                }
                Err(err) => {
                    warn!(error = %err, keys = report.keys.len(), "page eviction failed");
                }
            }
        }

        histogram!("tessera_invalidate_ms").record(started.elapsed().as_secs_f64() * 1000.0);
        info!(
            mutations = mutations.len(),
            handlers = report.handlers.len(),
            keys = report.keys.len(),
            removed = report.removed,
            "cache invalidated"
        );
        report
    }

    /// Cached body for `page`, treating store failures as a miss.
    pub fn fetch_page(&self, page: &PageKey) -> Option<Bytes> {
        match self.store.get(&self.store_key(page)) {
            Ok(body) => body,
            Err(err) => {
                warn!(page = %page, error = %err, "page cache lookup failed");
                None
            }
        }
    }

    /// Store a rendered page. Only GET requests are stored, and only when
    /// content caching is enabled; returns whether the page was written.
    pub fn store_page(&self, method: &Method, page: &PageKey, body: &[u8]) -> bool {
        if !self.config.cache_content || method != Method::GET {
            return false;
        }

        match self.store.set(&self.store_key(page), body) {
            Ok(()) => {
                counter!("tessera_page_cache_store_total", "outcome" => "stored").increment(1);
                debug!(page = %page, bytes = body.len(), "page stored");
                true
            }
            Err(err) => {
                counter!("tessera_page_cache_store_total", "outcome" => "failed").increment(1);
                warn!(page = %page, error = %err, "page store failed");
                false
            }
        }
    }

    /// Delete one store key as given, without applying the namespace.
    pub fn delete_key(&self, key: &str) -> Result<bool, CacheError> {
        let removed = self.store.delete(key)?;
        info!(key, removed, "cache key deleted");
        Ok(removed)
    }

    pub async fn invalidate_async(
        self: &Arc<Self>,
        mutations: Mutations,
    ) -> Result<InvalidationReport, CacheError> {
        self.run_blocking("invalidate", move |tracker| tracker.invalidate(&mutations))
            .await
    }

    pub async fn fetch_page_async(self: &Arc<Self>, page: PageKey) -> Option<Bytes> {
        self.run_blocking("fetch_page", move |tracker| tracker.fetch_page(&page))
            .await
            .unwrap_or_else(|err| {
                warn!(error = %err, "page cache lookup abandoned");
                None
            })
    }

    pub async fn store_page_async(self: &Arc<Self>, method: Method, page: PageKey, body: Bytes) -> bool {
        self.run_blocking("store_page", move |tracker| {
            tracker.store_page(&method, &page, &body)
        })
        .await
        .unwrap_or_else(|err| {
            warn!(error = %err, "page store abandoned");
            false
        })
    }

    pub async fn delete_key_async(self: &Arc<Self>, key: String) -> Result<bool, CacheError> {
        self.run_blocking("delete_key", move |tracker| tracker.delete_key(&key))
            .await?
    }

    async fn run_blocking<R, F>(self: &Arc<Self>, operation: &'static str, f: F) -> Result<R, CacheError>
    where
        F: FnOnce(&CacheTracker) -> R + Send + 'static,
        R: Send + 'static,
    {
        let tracker = Arc::clone(self);
        tokio::task::spawn_blocking(move || f(&*tracker))
            .await
            .map_err(|err| CacheError::task(operation, err))
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;
    use tempfile::{TempDir, tempdir};

    use super::*;
    use crate::{
        application::{
            error::AppError,
            handler::{Cacheable, Handler, HandlerOutput, HandlerRequest},
        },
        cache::{MemoryStore, StoreError},
    };

    struct Board;

    impl Cacheable for Board {
        fn reads(&self) -> BTreeSet<DataKey> {
            BTreeSet::from([DataKey::from("news"), DataKey::from("comment")])
        }

        fn invalidates(&self, key: &DataKey, payload: &Payload) -> Vec<PageKey> {
            match key.as_str() {
                "news" => vec![PageKey::from("/news/")],
                "comment" => vec![PageKey::new(format!("/news/{payload}/"))],
                _ => Vec::new(),
            }
        }
    }

    #[async_trait]
    impl Handler for Board {
        async fn handle(&self, _request: HandlerRequest) -> Result<HandlerOutput, AppError> {
            Ok(HandlerOutput::html("board"))
        }

        fn cacheable(&self) -> Option<&dyn Cacheable> {
            Some(self)
        }
    }

    /// Fails every call so tests can prove a path never reached the store.
    struct UnreachableStore;

    impl PageStore for UnreachableStore {
        fn get(&self, _key: &str) -> Result<Option<Bytes>, StoreError> {
            Err(StoreError::operation("get", "unreachable"))
        }

        fn set(&self, _key: &str, _value: &[u8]) -> Result<(), StoreError> {
            Err(StoreError::operation("set", "unreachable"))
        }

        fn delete(&self, _key: &str) -> Result<bool, StoreError> {
            panic!("store must not be called");
        }

        fn backend(&self) -> &'static str {
            "unreachable"
        }
    }

    fn config(dir: &TempDir) -> CacheConfig {
        CacheConfig {
            cache_content: true,
            namespace: "site".to_string(),
            dependency_snapshot_path: dir.path().join("deplist.json"),
            ..Default::default()
        }
    }

    fn tracker(dir: &TempDir, store: Arc<dyn PageStore>) -> CacheTracker {
        let registry = Arc::new(HandlerRegistry::new().with("news", Board));
        CacheTracker::new(config(dir), registry, store).expect("tracker")
    }

    #[test]
    fn rejects_empty_namespace_at_construction() {
        let dir = tempdir().expect("tempdir");
        let config = CacheConfig {
            namespace: String::new(),
            ..config(&dir)
        };
        let result = CacheTracker::new(
            config,
            Arc::new(HandlerRegistry::new()),
            Arc::new(MemoryStore::new()),
        );
        assert!(matches!(result, Err(CacheError::Configuration { .. })));
    }

    #[test]
    fn news_mutation_evicts_listing() {
        let dir = tempdir().expect("tempdir");
        let store = Arc::new(MemoryStore::new());
        store.set("site/news/", b"listing").expect("seed");
        store.set("site/news/42/", b"post").expect("seed");
        let tracker = tracker(&dir, store.clone());

        let report = tracker.invalidate(&Mutations::single("news", Payload::Null));

        assert_eq!(report.keys, ["site/news/"]);
        assert_eq!(report.removed, 1);
        assert_eq!(store.keys(), ["site/news/42/"]);
    }

    #[test]
    fn comment_mutation_evicts_post_page() {
        let dir = tempdir().expect("tempdir");
        let store = Arc::new(MemoryStore::new());
        let tracker = tracker(&dir, store);

        let report = tracker.invalidate(&Mutations::single("comment", json!(42)));
        assert_eq!(report.keys, ["site/news/42/"]);
        assert_eq!(report.handlers.len(), 1);
    }

    #[test]
    fn key_without_readers_makes_no_store_calls() {
        let dir = tempdir().expect("tempdir");
        let tracker = tracker(&dir, Arc::new(UnreachableStore));

        let report = tracker.invalidate(&Mutations::single("user", Payload::Null));
        assert!(report.handlers.is_empty());
        assert!(report.keys.is_empty());
    }

    #[test]
    fn first_invalidation_bootstraps_snapshot() {
        let dir = tempdir().expect("tempdir");
        let tracker = tracker(&dir, Arc::new(MemoryStore::new()));
        let path = dir.path().join("deplist.json");
        assert!(!path.exists());

        tracker.invalidate(&Mutations::single("news", Payload::Null));
        let loaded = DependencyIndex::load(&path).expect("load").expect("present");
        assert_eq!(&loaded, tracker.index().as_ref());
    }

    #[test]
    fn store_page_skips_non_get_and_disabled_caching() {
        let dir = tempdir().expect("tempdir");
        let store = Arc::new(MemoryStore::new());
        let tracker = tracker(&dir, store.clone());

        let listing = PageKey::from("/news/");
        assert!(!tracker.store_page(&Method::POST, &listing, b"x"));
        assert!(tracker.store_page(&Method::GET, &listing, b"x"));
        assert_eq!(store.keys(), ["site/news/"]);

        let disabled = CacheTracker::new(
            CacheConfig {
                cache_content: false,
                ..config(&dir)
            },
            Arc::new(HandlerRegistry::new()),
            store.clone(),
        )
        .expect("tracker");
        assert!(!disabled.store_page(&Method::GET, &PageKey::from("/other/"), b"x"));
    }

    #[test]
    fn store_failures_degrade_to_misses() {
        let dir = tempdir().expect("tempdir");
        let tracker = tracker(&dir, Arc::new(UnreachableStore));

        let listing = PageKey::from("/news/");
        assert!(tracker.fetch_page(&listing).is_none());
        assert!(!tracker.store_page(&Method::GET, &listing, b"x"));
    }

    #[tokio::test]
    async fn async_wrappers_run_on_blocking_pool() {
        let dir = tempdir().expect("tempdir");
        let store = Arc::new(MemoryStore::new());
        let tracker = Arc::new(tracker(&dir, store.clone()));

        let stored = tracker
            .store_page_async(Method::GET, PageKey::from("/news/"), Bytes::from_static(b"page"))
            .await;
        assert!(stored);
        assert_eq!(
            tracker.fetch_page_async(PageKey::from("/news/")).await,
            Some(Bytes::from_static(b"page"))
        );

        let report = tracker
            .invalidate_async(Mutations::single("news", Payload::Null))
            .await
            .expect("invalidate");
        assert_eq!(report.removed, 1);
        assert!(store.is_empty());
    }
}
