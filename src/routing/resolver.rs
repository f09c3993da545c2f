use std::sync::Arc;

use metrics::counter;
use tracing::debug;

use crate::domain::{
    arguments::Arguments,
    keys::{HandlerId, INDEX_SEGMENT, ROOT_INDEX, normalize_segment},
};

use super::{CleanPath, HandlerCatalog, RouteTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverMode {
    Filesystem,
    Cached,
}

impl ResolverMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ResolverMode::Filesystem => "filesystem",
            ResolverMode::Cached => "cached",
        }
    }
}

/// A resolved request: the cleaned segments, the handler that owns them and
/// whatever segments were left over as positional arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub segments: Vec<String>,
    pub handler: HandlerId,
    pub arguments: Arguments,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(Route),
    NotFound,
}

impl Resolution {
    pub fn is_found(&self) -> bool {
        matches!(self, Resolution::Found(_))
    }

    pub fn into_route(self) -> Option<Route> {
        match self {
            Resolution::Found(route) => Some(route),
            Resolution::NotFound => None,
        }
    }
}

/// Maps cleaned paths to handlers.
///
/// Without a [`RouteTable`] every request goes through the filesystem-fallback
/// search; attaching one switches to the cached lookup.
#[derive(Clone)]
pub struct RouteResolver {
    catalog: Arc<dyn HandlerCatalog>,
    table: Option<Arc<RouteTable>>,
    user_404: bool,
}

impl RouteResolver {
    pub fn new(catalog: Arc<dyn HandlerCatalog>, user_404: bool) -> Self {
        Self {
            catalog,
            table: None,
            user_404,
        }
    }

    pub fn with_table(mut self, table: RouteTable) -> Self {
        self.table = Some(Arc::new(table));
        self
    }

    pub fn mode(&self) -> ResolverMode {
        if self.table.is_some() {
            ResolverMode::Cached
        } else {
            ResolverMode::Filesystem
        }
    }

    pub fn resolve(&self, path: &CleanPath) -> Resolution {
        let resolution = match self.table.as_deref() {
            Some(table) => self.resolve_cached(table, path),
            None => self.resolve_filesystem(path),
        };

        let mode = self.mode().as_str();
        match &resolution {
            Resolution::Found(route) => {
                counter!("tessera_route_resolve_total", "mode" => mode, "outcome" => "found")
                    .increment(1);
                debug!(
                    path = %path,
                    mode,
                    handler = %route.handler,
                    arguments = route.arguments.len(),
                    "route resolved"
                );
            }
            Resolution::NotFound => {
                counter!("tessera_route_resolve_total", "mode" => mode, "outcome" => "not_found")
                    .increment(1);
                debug!(path = %path, mode, "no handler matched");
            }
        }

        resolution
    }

    /// Deepest-first probe of `prefix` and `prefix/index` against the catalog.
    pub fn resolve_filesystem(&self, path: &CleanPath) -> Resolution {
        let segments = path.segments();

        for depth in (1..=segments.len()).rev() {
            let probe = segments[..depth]
                .iter()
                .map(|segment| normalize_segment(segment))
                .collect::<Vec<_>>()
                .join("/");
            let index_probe = format!("{probe}/{INDEX_SEGMENT}");

            let matched = if self.catalog.contains(&probe) {
                Some(probe)
            } else if self.catalog.contains(&index_probe) {
                Some(index_probe)
            } else {
                None
            };

            if let Some(identity) = matched {
                return Resolution::Found(Route {
                    segments: to_owned(&segments),
                    handler: HandlerId::new(&identity),
                    arguments: Arguments::from_segments(segments[depth..].iter().copied()),
                });
            }
        }

        self.root_fallback(&segments, path.is_empty())
    }

    /// Specificity-ranked lookup against the sorted identity table, falling
    /// back to the root-index policy when no candidate lines up with a
    /// segment boundary.
    pub fn resolve_cached(&self, table: &RouteTable, path: &CleanPath) -> Resolution {
        let segments = path.segments();

        match table.lookup(path.as_str()) {
            Some((handler, arguments)) => Resolution::Found(Route {
                segments: to_owned(&segments),
                handler,
                arguments,
            }),
            None => self.root_fallback(&segments, path.is_empty()),
        }
    }

    fn root_fallback(&self, segments: &[&str], empty_path: bool) -> Resolution {
        if (self.user_404 || empty_path) && self.catalog.contains(ROOT_INDEX) {
            Resolution::Found(Route {
                segments: to_owned(segments),
                handler: HandlerId::new(ROOT_INDEX),
                arguments: Arguments::from_segments(segments.iter().copied()),
            })
        } else {
            Resolution::NotFound
        }
    }
}

fn to_owned(segments: &[&str]) -> Vec<String> {
    segments.iter().map(|segment| segment.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn catalog(ids: &[&str]) -> Arc<dyn HandlerCatalog> {
        Arc::new(ids.iter().map(|id| HandlerId::new(id)).collect::<BTreeSet<_>>())
    }

    fn path(raw: &str) -> CleanPath {
        CleanPath::parse::<&str>(raw, &[]).expect("clean path")
    }

    fn found(resolution: Resolution) -> Route {
        resolution.into_route().expect("route should resolve")
    }

    #[test]
    fn deepest_exact_match_wins() {
        let resolver = RouteResolver::new(catalog(&["index", "news", "news/archive"]), false);

        let route = found(resolver.resolve(&path("/news/archive/2024/05")));
        assert_eq!(route.handler.as_str(), "news/archive");
        assert_eq!(route.arguments.as_slice(), ["2024", "05"]);

        let route = found(resolver.resolve(&path("/news/7")));
        assert_eq!(route.handler.as_str(), "news");
        assert_eq!(route.arguments.as_slice(), ["7"]);
    }

    #[test]
    fn directory_index_is_probed_after_exact() {
        let resolver = RouteResolver::new(catalog(&["debug/index"]), false);

        let route = found(resolver.resolve(&path("/debug/stats")));
        assert_eq!(route.handler.as_str(), "debug/index");
        assert_eq!(route.arguments.as_slice(), ["stats"]);
    }

    #[test]
    fn probe_is_normalized_but_arguments_keep_original_case() {
        let resolver = RouteResolver::new(catalog(&["cache_stats"]), false);

        let route = found(resolver.resolve(&path("/Cache-Stats/Foo-Bar")));
        assert_eq!(route.handler.as_str(), "cache_stats");
        assert_eq!(route.arguments.as_slice(), ["Foo-Bar"]);
    }

    #[test]
    fn empty_path_uses_root_index() {
        let resolver = RouteResolver::new(catalog(&["index", "news"]), false);

        let route = found(resolver.resolve(&path("/")));
        assert!(route.handler.is_root_index());
        assert!(route.arguments.is_empty());
    }

    #[test]
    fn unknown_path_is_not_found_without_user_404() {
        let resolver = RouteResolver::new(catalog(&["index", "news"]), false);
        assert_eq!(resolver.resolve(&path("/blog/1")), Resolution::NotFound);
    }

    #[test]
    fn user_404_routes_unknown_paths_to_root_index() {
        let resolver = RouteResolver::new(catalog(&["index", "news"]), true);

        let route = found(resolver.resolve(&path("/blog/1")));
        assert!(route.handler.is_root_index());
        assert_eq!(route.arguments.as_slice(), ["blog", "1"]);
    }

    #[test]
    fn missing_root_index_is_not_found_even_for_empty_path() {
        let resolver = RouteResolver::new(catalog(&["news"]), true);
        assert_eq!(resolver.resolve(&path("")), Resolution::NotFound);
    }

    #[test]
    fn mode_follows_attached_table() {
        let ids = catalog(&["index", "news"]);
        let resolver = RouteResolver::new(ids.clone(), false);
        assert_eq!(resolver.mode(), ResolverMode::Filesystem);

        let cached = resolver.with_table(RouteTable::from_catalog(&*ids));
        assert_eq!(cached.mode(), ResolverMode::Cached);

        let route = found(cached.resolve(&path("/news/3")));
        assert_eq!(route.handler.as_str(), "news");
        assert_eq!(route.arguments.as_slice(), ["3"]);
    }
}
