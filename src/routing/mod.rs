//! Request path to handler resolution.
//!
//! Two strategies share one contract. The filesystem-fallback search probes
//! the handler catalog from the deepest path segment toward the root and is
//! authoritative. The cached lookup scans a persisted, sorted identity list
//! and ranks candidates by alphabetic specificity; it trades exactness for a
//! single pass over a snapshot.

mod path;
mod resolver;
mod table;

use std::collections::BTreeSet;

pub use path::{CleanPath, PathError};
pub use resolver::{Resolution, ResolverMode, Route, RouteResolver};
pub use table::RouteTable;

use crate::domain::keys::HandlerId;

/// Read-only view of the registered handler identities.
pub trait HandlerCatalog: Send + Sync {
    /// Whether a handler is registered under the normalized form of `id`.
    fn contains(&self, id: &str) -> bool;

    fn identities(&self) -> Vec<HandlerId>;
}

impl HandlerCatalog for BTreeSet<HandlerId> {
    fn contains(&self, id: &str) -> bool {
        BTreeSet::contains(self, &HandlerId::new(id))
    }

    fn identities(&self) -> Vec<HandlerId> {
        self.iter().cloned().collect()
    }
}
