//! Reverse index from data keys to the handlers that read them.

use std::{
    collections::{BTreeMap, BTreeSet},
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::{
    application::registry::HandlerRegistry,
    domain::keys::{DataKey, HandlerId},
    infra::snapshot::{self, SnapshotError},
};

/// `DataKey -> {HandlerId}` with deterministic ordering, so two builds from
/// the same registry serialize to identical bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DependencyIndex(BTreeMap<DataKey, BTreeSet<HandlerId>>);

impl DependencyIndex {
    /// Walk every cacheable handler and file its identity under each key it
    /// reads. Handlers with no reads contribute nothing.
    pub fn build(registry: &HandlerRegistry) -> Self {
        let mut index: BTreeMap<DataKey, BTreeSet<HandlerId>> = BTreeMap::new();
        for (id, cacheable) in registry.cacheable() {
            for key in cacheable.reads() {
                index.entry(key).or_default().insert(id.clone());
            }
        }
        Self(index)
    }

    pub fn handlers_for(&self, key: &DataKey) -> impl Iterator<Item = &HandlerId> {
        self.0.get(key).into_iter().flatten()
    }

    pub fn keys(&self) -> impl Iterator<Item = &DataKey> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `Ok(None)` when no snapshot exists yet.
    pub fn load(path: &Path) -> Result<Option<Self>, SnapshotError> {
        snapshot::read_json(path)
    }

    pub fn persist(&self, path: &Path) -> Result<(), SnapshotError> {
        snapshot::write_json_atomic(path, self)
    }
}

impl FromIterator<(DataKey, HandlerId)> for DependencyIndex {
    fn from_iter<I: IntoIterator<Item = (DataKey, HandlerId)>>(iter: I) -> Self {
        let mut index: BTreeMap<DataKey, BTreeSet<HandlerId>> = BTreeMap::new();
        for (key, id) in iter {
            index.entry(key).or_default().insert(id);
        }
        Self(index)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn sample() -> DependencyIndex {
        [
            ("news", "news"),
            ("comment", "news"),
            ("news", "index"),
        ]
        .into_iter()
        .map(|(key, id)| (DataKey::from(key), HandlerId::new(id)))
        .collect()
    }

    #[test]
    fn handlers_for_unknown_key_is_empty() {
        let index = sample();
        assert_eq!(index.handlers_for(&DataKey::from("missing")).count(), 0);

        let readers: Vec<_> = index
            .handlers_for(&DataKey::from("news"))
            .map(HandlerId::as_str)
            .collect();
        assert_eq!(readers, ["index", "news"]);
    }

    #[test]
    fn snapshot_format_is_key_to_sorted_identities() {
        let encoded = serde_json::to_string(&sample()).expect("encode");
        assert_eq!(encoded, r#"{"comment":["news"],"news":["index","news"]}"#);
    }

    #[test]
    fn persist_then_load_roundtrips() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("deplist.json");

        let index = sample();
        index.persist(&path).expect("persist");
        let loaded = DependencyIndex::load(&path).expect("load");
        assert_eq!(loaded, Some(index));
    }
}
