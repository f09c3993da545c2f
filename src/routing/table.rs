//! Persisted route table for the cached lookup.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    domain::{
        arguments::Arguments,
        keys::{HandlerId, normalize_segment},
    },
    infra::snapshot::{self, SnapshotError},
};

use super::HandlerCatalog;

/// Alphabetically sorted, duplicate-free handler identities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteTable {
    identities: Vec<HandlerId>,
}

impl RouteTable {
    pub fn from_identities(identities: impl IntoIterator<Item = HandlerId>) -> Self {
        let mut identities: Vec<HandlerId> = identities
            .into_iter()
            .filter(|id| !id.as_str().is_empty())
            .collect();
        identities.sort();
        identities.dedup();
        Self { identities }
    }

    pub fn from_catalog(catalog: &dyn HandlerCatalog) -> Self {
        Self::from_identities(catalog.identities())
    }

    /// Read the snapshot at `path`, rebuilding and persisting it from
    /// `catalog` when it is missing or unreadable.
    pub fn load_or_build(path: &Path, catalog: &dyn HandlerCatalog) -> Self {
        match snapshot::read_json::<Vec<HandlerId>>(path) {
            Ok(Some(identities)) => return Self::from_identities(identities),
            Ok(None) => {
                info!(path = %path.display(), "route snapshot absent, rebuilding");
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "route snapshot unreadable, rebuilding");
            }
        }

        let table = Self::from_catalog(catalog);
        if let Err(err) = table.persist(path) {
            warn!(
                path = %path.display(),
                error = %err,
                "failed to persist route snapshot; using in-memory table"
            );
        }
        table
    }

    pub fn persist(&self, path: &Path) -> Result<(), SnapshotError> {
        snapshot::write_json_atomic(path, self)
    }

    pub fn identities(&self) -> &[HandlerId] {
        &self.identities
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    /// Candidate with the highest alphabetic specificity against `route`.
    ///
    /// `route` must already be normalized. Specificity counts the alphabetic
    /// bytes of the common literal prefix; other bytes must match but do not
    /// score. Only a strictly higher score replaces the current best.
    pub fn best_match(&self, route: &str) -> Option<&HandlerId> {
        highest(self.scored(route)).map(|(candidate, _)| candidate)
    }

    /// Resolve `path` (cleaned, original case) to a handler and the segments
    /// left after stripping its identity.
    ///
    /// Only candidates ending on a segment boundary of `path` compete, so a
    /// longer identity diverging mid-segment (`news/archive` against
    /// `news/a1`) never hides a shorter one that fits.
    pub fn lookup(&self, path: &str) -> Option<(HandlerId, Arguments)> {
        let normalized = normalize_segment(path);
        let aligned = self.scored(&normalized).filter_map(|(candidate, score)| {
            aligned_length(&normalized, candidate).map(|consumed| ((candidate, consumed), score))
        });
        let ((winner, consumed), _) = highest(aligned)?;

        let rest = &path[consumed..];
        let arguments = Arguments::from_segments(rest.split('/').filter(|s| !s.is_empty()));
        Some((winner.clone(), arguments))
    }

    /// Candidates sharing the first byte of `route`, in sorted order, with
    /// their specificity.
    fn scored<'s>(&'s self, route: &str) -> impl Iterator<Item = (&'s HandlerId, usize)> {
        let route = route.as_bytes();
        let first = route.first().copied();

        let start = match first {
            Some(first) => self
                .identities
                .partition_point(|id| id.as_str().as_bytes().first().is_some_and(|&b| b < first)),
            None => self.identities.len(),
        };

        self.identities[start..]
            .iter()
            .take_while(move |candidate| candidate.as_str().as_bytes().first().copied() == first)
            .map(move |candidate| {
                let specificity = route
                    .iter()
                    .zip(candidate.as_str().as_bytes())
                    .take_while(|(left, right)| left == right)
                    .filter(|(byte, _)| byte.is_ascii_alphabetic())
                    .count();
                (candidate, specificity)
            })
    }
}

/// First entry with the strictly highest non-zero score.
fn highest<T>(scored: impl Iterator<Item = (T, usize)>) -> Option<(T, usize)> {
    let mut best: Option<(T, usize)> = None;
    for (item, score) in scored {
        if score > best.as_ref().map_or(0, |(_, top)| *top) {
            best = Some((item, score));
        }
    }
    best
}

/// Bytes of `path` a candidate covers: its full identity, or the directory
/// of a non-root `…/index` identity, ending on a segment boundary.
fn aligned_length(path: &str, candidate: &HandlerId) -> Option<usize> {
    strip_identity(path, candidate.as_str()).or_else(|| {
        candidate
            .index_base()
            .filter(|base| !base.is_empty())
            .and_then(|base| strip_identity(path, base))
    })
}

/// Byte length of `path` covered by `prefix` when it ends on a segment
/// boundary.
fn strip_identity(path: &str, prefix: &str) -> Option<usize> {
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() || rest.starts_with('/') {
        Some(prefix.len())
    } else {
        None
    }
}
