//! Startup orchestration.
//!
//! # Responsibilities
//! - Hold the live configuration and its generation in a `ServerContext`
//! - Build a generation from configuration by resolving every plugin entry
//! - Swap generations atomically on reload
//!
//! # Design Decisions
//! - A bad route or middleware entry is logged and skipped, never fatal
//! - Generations are numbered; the number appears in every access log line
//! - The plugin registry is declared last so loaded libraries outlive the
//!   instances they produced

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::config::{MiddlewareConfig, RouteConfig, ServerConfig};
use crate::dispatch::{Generation, MiddlewareUnit};
use crate::observability::metrics;
use crate::plugin::{PluginError, PluginRegistry};
use crate::routing::{MethodSet, RouteEntry, Router};

/// Shared state of a running server.
pub struct ServerContext {
    generation: ArcSwap<Generation>,
    config: ArcSwap<ServerConfig>,
    next_generation: AtomicU64,
    registry: PluginRegistry,
}

impl ServerContext {
    /// Build the first generation from `config`.
    pub fn new(config: ServerConfig, registry: PluginRegistry) -> Self {
        let first = build_generation(1, &config, &registry);
        Self {
            generation: ArcSwap::from_pointee(first),
            config: ArcSwap::from_pointee(config),
            next_generation: AtomicU64::new(2),
            registry,
        }
    }

    /// The generation new requests are dispatched against.
    pub fn generation(&self) -> Arc<Generation> {
        self.generation.load_full()
    }

    pub fn config(&self) -> Arc<ServerConfig> {
        self.config.load_full()
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// Build a generation from `config` and make it live. Requests already
    /// dispatched finish on the generation they started with.
    pub fn reload(&self, config: ServerConfig) -> Arc<Generation> {
        let id = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let generation = Arc::new(build_generation(id, &config, &self.registry));

        let previous = self.generation.swap(Arc::clone(&generation));
        self.config.store(Arc::new(config));

        tracing::info!(
            generation = id,
            previous = previous.id(),
            routes = generation.router().len(),
            middleware = generation.middleware().len(),
            "Configuration reloaded"
        );
        generation
    }
}

impl fmt::Debug for ServerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerContext")
            .field("generation", &self.generation.load().id())
            .field("registry", &self.registry)
            .finish()
    }
}

/// Resolve every configured route and middleware into a generation.
pub fn build_generation(id: u64, config: &ServerConfig, registry: &PluginRegistry) -> Generation {
    let mut router = Router::new();
    for (index, route) in config.routes.iter().enumerate() {
        match build_route(route, registry) {
            Ok(entry) => router.add_route(entry),
            Err(e) => tracing::error!(
                generation = id,
                route = index,
                path = %route.path,
                handler = %route.label(),
                error = %e,
                "Skipping route"
            ),
        }
    }

    let mut middleware = Vec::with_capacity(config.middleware.len());
    for (index, entry) in config.middleware.iter().enumerate() {
        match build_middleware(entry, registry) {
            Ok(unit) => middleware.push(unit),
            Err(e) => tracing::error!(
                generation = id,
                middleware = index,
                name = %entry.label(),
                error = %e,
                "Skipping middleware"
            ),
        }
    }

    tracing::info!(
        generation = id,
        routes = router.len(),
        skipped_routes = config.routes.len() - router.len(),
        middleware = middleware.len(),
        skipped_middleware = config.middleware.len() - middleware.len(),
        "Generation built"
    );
    metrics::record_generation(id, router.len(), middleware.len());

    Generation::new(id, router, middleware)
}

fn build_route(route: &RouteConfig, registry: &PluginRegistry) -> Result<RouteEntry, PluginError> {
    let path = route.path.trim();
    if path.is_empty() {
        return Err(PluginError::InvalidEntry("route path is empty".to_string()));
    }
    if !path.starts_with('/') {
        return Err(PluginError::InvalidEntry(format!(
            "route path `{path}` must start with `/`"
        )));
    }

    let handler = registry.resolve_handler(&route.reference())?;
    Ok(RouteEntry::new(
        path,
        MethodSet::from_names(&route.methods),
        handler,
        route.label(),
    ))
}

fn build_middleware(entry: &MiddlewareConfig, registry: &PluginRegistry) -> Result<MiddlewareUnit, PluginError> {
    let instance = registry.resolve_middleware(&entry.reference())?;
    Ok(MiddlewareUnit::new(entry.label(), instance))
}
