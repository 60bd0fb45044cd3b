//! Configuration generations.
//!
//! A generation is the route table and middleware chain resolved from one
//! configuration. Workers load the live generation once per request, and a
//! reload swaps in a new one without touching requests already running.

use std::fmt;
use std::sync::Arc;

use crate::plugin::Middleware;
use crate::routing::Router;

/// A configured middleware instance.
#[derive(Clone)]
pub struct MiddlewareUnit {
    pub name: String,
    pub instance: Arc<dyn Middleware>,
}

impl MiddlewareUnit {
    pub fn new(name: impl Into<String>, instance: Arc<dyn Middleware>) -> Self {
        Self {
            name: name.into(),
            instance,
        }
    }
}

impl fmt::Debug for MiddlewareUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MiddlewareUnit").field(&self.name).finish()
    }
}

/// Route table and middleware chain built from one configuration.
///
/// Read-only while live; a reload replaces the whole generation.
#[derive(Debug, Default)]
pub struct Generation {
    id: u64,
    router: Router,
    middleware: Vec<MiddlewareUnit>,
}

impl Generation {
    pub fn new(id: u64, router: Router, middleware: Vec<MiddlewareUnit>) -> Self {
        Self {
            id,
            router,
            middleware,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Middleware in configuration order.
    pub fn middleware(&self) -> &[MiddlewareUnit] {
        &self.middleware
    }
}
