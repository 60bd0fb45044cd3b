//! Plugin subsystem.
//!
//! # Data Flow
//! ```text
//! RouteConfig / MiddlewareConfig
//!     → PluginReference (module?, class_name, settings)
//!     → registry.rs (built-in catalog, else module.rs loads the library)
//!     → fresh instance, configure(settings) when Configurable
//!     → Arc<dyn Handler> / Arc<dyn Middleware> in the next generation
//! ```
//!
//! # Design Decisions
//! - Class names are looked up in a string-keyed catalog of constructors
//! - Configurability is declared at registration time, not discovered at runtime
//! - Every resolution builds a new instance; nothing is shared between routes

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::http::{Request, RequestContext, RequestError, Response};

pub mod error;
pub mod module;
pub mod registry;
pub mod settings;

pub use error::{ConfigurationError, PluginError, ResolutionError};
pub use registry::{HandlerFactory, MiddlewareFactory, PluginCatalog, PluginRegistry};

/// Free-form plugin options as they appear in the configuration document.
pub type Settings = HashMap<String, serde_json::Value>;

/// Produces the response for a matched route.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle_request(
        &self,
        request: &Request,
        response: &mut Response,
    ) -> Result<(), RequestError>;
}

/// A cross-cutting step run before routing.
///
/// Returning `Ok(false)` ends the request: no further middleware runs and no
/// handler is invoked. The middleware is expected to have set the response.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn process_request(&self, ctx: &mut RequestContext) -> Result<bool, RequestError>;
}

/// Accepts settings once, right after instantiation.
pub trait Configurable {
    fn configure(&mut self, settings: &Settings) -> Result<(), ConfigurationError>;
}

/// A handler that also takes settings.
pub trait ConfigurableHandler: Handler + Configurable {
    fn into_handler(self: Box<Self>) -> Box<dyn Handler>;
}

impl<T: Handler + Configurable + 'static> ConfigurableHandler for T {
    fn into_handler(self: Box<Self>) -> Box<dyn Handler> {
        self
    }
}

/// A middleware that also takes settings.
pub trait ConfigurableMiddleware: Middleware + Configurable {
    fn into_middleware(self: Box<Self>) -> Box<dyn Middleware>;
}

impl<T: Middleware + Configurable + 'static> ConfigurableMiddleware for T {
    fn into_middleware(self: Box<Self>) -> Box<dyn Middleware> {
        self
    }
}

/// Identifies a plugin class and the options to configure it with.
#[derive(Debug, Clone, Default)]
pub struct PluginReference {
    /// Dynamic library holding the class; `None` means built-in only.
    pub module: Option<PathBuf>,
    pub class_name: String,
    pub settings: Settings,
}

impl PluginReference {
    /// A reference to a built-in class with no settings.
    pub fn builtin(class_name: impl Into<String>) -> Self {
        Self {
            module: None,
            class_name: class_name.into(),
            settings: Settings::new(),
        }
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.settings.insert(key.into(), value);
        self
    }

    pub fn with_module(mut self, module: impl Into<PathBuf>) -> Self {
        self.module = Some(module.into());
        self
    }
}
