//! Pluggable HTTP server engine.
//!
//! Requests flow from a transport front-end through a bounded queue to a
//! worker pool, which runs each one through the configured middleware chain
//! and the most specific matching route handler. Handlers and middleware are
//! plugins resolved by class name from built-ins or dynamic libraries.

// Core engine
pub mod dispatch;
pub mod http;
pub mod net;
pub mod routing;

// Plugins
pub mod cache;
pub mod handlers;
pub mod plugin;
pub mod security;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::ServerConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use plugin::PluginRegistry;
