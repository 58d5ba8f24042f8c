//! Router core: path matching, method selection and the tie-break.

use http::Method;
use smallvec::SmallVec;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::radix::RadixTree;
use crate::design::{ApiDefinition, RouteEntry};
use crate::error::RoutingError;

/// Maximum number of path/query parameters before heap allocation.
/// Most routes have at most four captures (e.g. `/users/{id}/posts/{post_id}`).
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated parameter storage. Names are shared with the route tree;
/// values are per-request, percent-decoded strings.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// A request path resolved to one action.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub entry: RouteEntry,
    /// Captured path segments (e.g. `{id}` → `("id", "123")`)
    pub path_params: ParamVec,
}

impl RouteMatch {
    /// Get a path parameter by name
    #[inline]
    #[must_use]
    pub fn get_path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn handler_name(&self) -> &str {
        &self.entry.handler_name
    }
}

/// Immutable routing table built once from an [`ApiDefinition`].
///
/// Matching collects every action whose template fits the path, then:
/// - keeps those declared for the request method; if there are none the
///   result is `405` with the union of the path's methods, or `404` when no
///   template fit at all
/// - among the remaining candidates, the template with the most literal
///   segments wins
#[derive(Debug, Clone)]
pub struct Router {
    tree: RadixTree,
    entries: Vec<RouteEntry>,
}

impl Router {
    #[must_use]
    pub fn new(api: &ApiDefinition) -> Self {
        let entries = api.routes();
        let routes_summary: Vec<String> = entries
            .iter()
            .take(10)
            .map(|e| format!("{} {}", e.action.method, e.action.route.path()))
            .collect();

        info!(
            routes_count = entries.len(),
            api = %api.name,
            routes_summary = ?routes_summary,
            routing_algorithm = "radix_tree",
            "Routing table loaded"
        );

        Self {
            tree: RadixTree::new(entries.clone()),
            entries,
        }
    }

    /// All routable actions, in declaration order.
    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    /// Print the routing table to stdout.
    pub fn dump_routes(&self) {
        println!("[routes] count={}", self.entries.len());
        for e in &self.entries {
            println!(
                "[route] {} {} -> {}",
                e.action.method,
                e.action.route,
                e.handler_name
            );
        }
    }

    /// Resolve `method` + `path` to exactly one action.
    pub fn route(&self, method: &Method, path: &str) -> Result<RouteMatch, RoutingError> {
        debug!(
            method = %method,
            path = %path,
            algorithm = "radix_tree",
            "Route match attempt"
        );
        let match_start = Instant::now();

        let decoded: SmallVec<[String; MAX_INLINE_PARAMS]> = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| {
                urlencoding::decode(s)
                    .map(|c| c.into_owned())
                    .unwrap_or_else(|_| s.to_string())
            })
            .collect();
        let segments: SmallVec<[&str; MAX_INLINE_PARAMS]> =
            decoded.iter().map(String::as_str).collect();

        let candidates = self.tree.search(&segments);
        let match_duration = match_start.elapsed();

        if candidates.is_empty() {
            warn!(
                method = %method,
                path = %path,
                duration_us = match_duration.as_micros() as u64,
                "No route matched"
            );
            return Err(RoutingError::NoRouteMatched {
                method: method.clone(),
                path: path.to_string(),
            });
        }

        let best = candidates
            .iter()
            .filter(|(t, _)| &t.entry.action.method == method)
            .max_by(|(a, _), (b, _)| {
                a.entry
                    .action
                    .route
                    .literal_count()
                    .cmp(&b.entry.action.route.literal_count())
                    // earlier declaration wins on an (already rejected) tie
                    .then(b.order.cmp(&a.order))
            });

        let Some((terminal, params)) = best else {
            let mut allow: Vec<Method> = candidates
                .iter()
                .map(|(t, _)| t.entry.action.method.clone())
                .collect();
            allow.sort_by(|a, b| a.as_str().cmp(b.as_str()));
            allow.dedup();
            warn!(
                method = %method,
                path = %path,
                allow = ?allow,
                "Method not allowed"
            );
            return Err(RoutingError::MethodNotAllowed {
                method: method.clone(),
                path: path.to_string(),
                allow,
            });
        };

        log_match(method, path, &terminal.entry, match_duration);

        Ok(RouteMatch {
            entry: terminal.entry.clone(),
            path_params: params.clone(),
        })
    }
}

fn log_match(method: &Method, path: &str, entry: &RouteEntry, duration: Duration) {
    if duration > Duration::from_millis(1) {
        warn!(
            method = %method,
            path = %path,
            handler_name = %entry.handler_name,
            route_pattern = %entry.action.route,
            duration_us = duration.as_micros() as u64,
            "Slow route matching detected"
        );
    } else {
        info!(
            method = %method,
            path = %path,
            handler_name = %entry.handler_name,
            route_pattern = %entry.action.route,
            duration_us = duration.as_micros() as u64,
            "Route matched"
        );
    }
}
