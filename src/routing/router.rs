//! Route lookup.
//!
//! # Responsibilities
//! - Store compiled routes in specificity order
//! - Look up the matching route for a (path, method) pair
//! - Return the matched route or an explicit no-match
//!
//! # Design Decisions
//! - Immutable once a generation is live; a reload builds a new router
//! - Stable sort, so routes that tie on every key keep configuration order
//! - O(n) scan, acceptable for typical route counts

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use axum::http::Method;

use crate::plugin::Handler;
use crate::routing::matcher::{MethodSet, PathPattern};

/// A compiled route.
#[derive(Clone)]
pub struct RouteEntry {
    pub pattern: PathPattern,
    pub methods: MethodSet,
    pub handler: Arc<dyn Handler>,
    /// Class name of the handler, for logs.
    pub handler_name: String,
}

impl RouteEntry {
    pub fn new(
        path: &str,
        methods: MethodSet,
        handler: Arc<dyn Handler>,
        handler_name: impl Into<String>,
    ) -> Self {
        Self {
            pattern: PathPattern::parse(path),
            methods,
            handler,
            handler_name: handler_name.into(),
        }
    }

    pub fn matches(&self, path: &str, method: &Method) -> bool {
        self.pattern.matches(path) && self.methods.matches(method)
    }

    /// Most specific first: longer literal, then exact before wildcard, then
    /// fewer methods.
    pub fn specificity_cmp(&self, other: &Self) -> Ordering {
        other
            .pattern
            .literal_len()
            .cmp(&self.pattern.literal_len())
            .then_with(|| self.pattern.is_wildcard().cmp(&other.pattern.is_wildcard()))
            .then_with(|| self.methods.width().cmp(&other.methods.width()))
    }
}

impl fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteEntry")
            .field("path", &self.pattern.to_string())
            .field("methods", &self.methods.to_string())
            .field("handler", &self.handler_name)
            .finish()
    }
}

/// Ordered route table.
#[derive(Debug, Clone, Default)]
pub struct Router {
    routes: Vec<RouteEntry>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = RouteEntry>) -> Self {
        let mut router = Self::new();
        for entry in entries {
            router.add_route(entry);
        }
        router
    }

    /// Insert a route, keeping the table in specificity order.
    pub fn add_route(&mut self, entry: RouteEntry) {
        self.routes.push(entry);
        self.routes.sort_by(RouteEntry::specificity_cmp);
    }

    /// First route, in specificity order, accepting `path` and `method`.
    pub fn matches(&self, path: &str, method: &Method) -> Option<&RouteEntry> {
        self.routes.iter().find(|route| route.matches(path, method))
    }

    pub fn routes(&self) -> &[RouteEntry] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
