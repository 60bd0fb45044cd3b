//! Class-name catalog and plugin resolution.
//!
//! # Responsibilities
//! - Map class names to constructors for handlers and middleware
//! - Register the built-in classes
//! - Load dynamic modules once per path and consult their catalogs
//! - Instantiate and configure a fresh plugin for every reference
//!
//! # Design Decisions
//! - Built-ins win over module classes with the same name
//! - Loaded modules are cached in a `DashMap` keyed by canonical path
//! - The registry owns the libraries; it must outlive every instance it produced

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;

use crate::handlers::{SampleDynamicContentHandler, StaticFilesHandler};
use crate::http::compression::CompressionModule;
use crate::plugin::module::PluginModule;
use crate::plugin::{
    ConfigurableHandler, ConfigurableMiddleware, Handler, Middleware, PluginError,
    PluginReference, ResolutionError, Settings,
};
use crate::security::{ApiKeyGuard, RateLimiter};

type HandlerCtor = Arc<dyn Fn() -> Box<dyn Handler> + Send + Sync>;
type ConfigurableHandlerCtor = Arc<dyn Fn() -> Box<dyn ConfigurableHandler> + Send + Sync>;
type MiddlewareCtor = Arc<dyn Fn() -> Box<dyn Middleware> + Send + Sync>;
type ConfigurableMiddlewareCtor = Arc<dyn Fn() -> Box<dyn ConfigurableMiddleware> + Send + Sync>;

/// Constructor for a handler class.
#[derive(Clone)]
pub enum HandlerFactory {
    /// Settings are ignored.
    Plain(HandlerCtor),
    /// `configure` is called with the reference's settings.
    Configurable(ConfigurableHandlerCtor),
}

/// Constructor for a middleware class.
#[derive(Clone)]
pub enum MiddlewareFactory {
    Plain(MiddlewareCtor),
    Configurable(ConfigurableMiddlewareCtor),
}

impl HandlerFactory {
    fn instantiate(&self, class: &str, settings: &Settings) -> Result<Box<dyn Handler>, PluginError> {
        match self {
            HandlerFactory::Plain(ctor) => {
                if !settings.is_empty() {
                    tracing::debug!(class = %class, "Handler is not configurable; settings ignored");
                }
                Ok(ctor())
            }
            HandlerFactory::Configurable(ctor) => {
                let mut instance = ctor();
                instance
                    .configure(settings)
                    .map_err(|source| PluginError::Configuration {
                        class: class.to_string(),
                        source,
                    })?;
                Ok(instance.into_handler())
            }
        }
    }
}

impl MiddlewareFactory {
    fn instantiate(
        &self,
        class: &str,
        settings: &Settings,
    ) -> Result<Box<dyn Middleware>, PluginError> {
        match self {
            MiddlewareFactory::Plain(ctor) => {
                if !settings.is_empty() {
                    tracing::debug!(class = %class, "Middleware is not configurable; settings ignored");
                }
                Ok(ctor())
            }
            MiddlewareFactory::Configurable(ctor) => {
                let mut instance = ctor();
                instance
                    .configure(settings)
                    .map_err(|source| PluginError::Configuration {
                        class: class.to_string(),
                        source,
                    })?;
                Ok(instance.into_middleware())
            }
        }
    }
}

#[derive(Clone)]
enum CatalogEntry {
    Handler(HandlerFactory),
    Middleware(MiddlewareFactory),
}

/// Class name to constructor mapping.
///
/// Dynamic modules receive an empty catalog in their `register_plugins` entry
/// point and fill it with their classes.
#[derive(Clone, Default)]
pub struct PluginCatalog {
    entries: HashMap<String, CatalogEntry>,
}

impl PluginCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The catalog of classes shipped with the server.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        catalog.register_configurable_handler(StaticFilesHandler::CLASS_NAME, StaticFilesHandler::default);
        catalog.register_configurable_handler(
            SampleDynamicContentHandler::CLASS_NAME,
            SampleDynamicContentHandler::default,
        );
        catalog.register_configurable_middleware(ApiKeyGuard::CLASS_NAME, ApiKeyGuard::default);
        catalog.register_configurable_middleware(RateLimiter::CLASS_NAME, RateLimiter::default);
        catalog.register_configurable_middleware(CompressionModule::CLASS_NAME, CompressionModule::default);
        catalog
    }

    pub fn register_handler<H, F>(&mut self, class_name: impl Into<String>, ctor: F)
    where
        H: Handler + 'static,
        F: Fn() -> H + Send + Sync + 'static,
    {
        let ctor: HandlerCtor = Arc::new(move || Box::new(ctor()));
        self.insert(class_name.into(), CatalogEntry::Handler(HandlerFactory::Plain(ctor)));
    }

    pub fn register_configurable_handler<H, F>(&mut self, class_name: impl Into<String>, ctor: F)
    where
        H: ConfigurableHandler + 'static,
        F: Fn() -> H + Send + Sync + 'static,
    {
        let ctor: ConfigurableHandlerCtor = Arc::new(move || Box::new(ctor()));
        self.insert(
            class_name.into(),
            CatalogEntry::Handler(HandlerFactory::Configurable(ctor)),
        );
    }

    pub fn register_middleware<M, F>(&mut self, class_name: impl Into<String>, ctor: F)
    where
        M: Middleware + 'static,
        F: Fn() -> M + Send + Sync + 'static,
    {
        let ctor: MiddlewareCtor = Arc::new(move || Box::new(ctor()));
        self.insert(
            class_name.into(),
            CatalogEntry::Middleware(MiddlewareFactory::Plain(ctor)),
        );
    }

    pub fn register_configurable_middleware<M, F>(&mut self, class_name: impl Into<String>, ctor: F)
    where
        M: ConfigurableMiddleware + 'static,
        F: Fn() -> M + Send + Sync + 'static,
    {
        let ctor: ConfigurableMiddlewareCtor = Arc::new(move || Box::new(ctor()));
        self.insert(
            class_name.into(),
            CatalogEntry::Middleware(MiddlewareFactory::Configurable(ctor)),
        );
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.entries.contains_key(class_name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn handler(&self, class_name: &str) -> Option<Result<&HandlerFactory, ResolutionError>> {
        self.entries.get(class_name).map(|entry| match entry {
            CatalogEntry::Handler(factory) => Ok(factory),
            CatalogEntry::Middleware(_) => Err(ResolutionError::WrongKind {
                class: class_name.to_string(),
                expected: "handler",
            }),
        })
    }

    pub fn middleware(
        &self,
        class_name: &str,
    ) -> Option<Result<&MiddlewareFactory, ResolutionError>> {
        self.entries.get(class_name).map(|entry| match entry {
            CatalogEntry::Middleware(factory) => Ok(factory),
            CatalogEntry::Handler(_) => Err(ResolutionError::WrongKind {
                class: class_name.to_string(),
                expected: "middleware",
            }),
        })
    }

    fn insert(&mut self, class_name: String, entry: CatalogEntry) {
        if self.entries.insert(class_name.clone(), entry).is_some() {
            tracing::warn!(class = %class_name, "Plugin class registered twice; last registration wins");
        }
    }
}

impl fmt::Debug for PluginCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.class_names().collect();
        names.sort_unstable();
        f.debug_struct("PluginCatalog").field("classes", &names).finish()
    }
}

/// Resolves plugin references into live instances.
pub struct PluginRegistry {
    builtins: PluginCatalog,
    modules: DashMap<PathBuf, Arc<PluginModule>>,
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl PluginRegistry {
    /// A registry with no classes at all.
    pub fn empty() -> Self {
        Self {
            builtins: PluginCatalog::new(),
            modules: DashMap::new(),
        }
    }

    /// A registry preloaded with the built-in handler and middleware classes.
    pub fn with_builtins() -> Self {
        Self {
            builtins: PluginCatalog::builtin(),
            modules: DashMap::new(),
        }
    }

    /// Built-in catalog, for programmatic registration of extra classes.
    pub fn catalog_mut(&mut self) -> &mut PluginCatalog {
        &mut self.builtins
    }

    pub fn catalog(&self) -> &PluginCatalog {
        &self.builtins
    }

    pub fn loaded_modules(&self) -> usize {
        self.modules.len()
    }

    /// Resolve, instantiate and configure a handler.
    pub fn resolve_handler(&self, reference: &PluginReference) -> Result<Arc<dyn Handler>, PluginError> {
        let class = reference.class_name.trim();
        if class.is_empty() {
            return Err(PluginError::InvalidEntry("empty handler class name".to_string()));
        }

        let handler = if let Some(factory) = self.builtins.handler(class) {
            factory?.instantiate(class, &reference.settings)?
        } else {
            let module = self.module_for(class, reference.module.as_deref())?;
            let factory = module
                .catalog()
                .handler(class)
                .ok_or_else(|| ResolutionError::ClassNotFound {
                    class: class.to_string(),
                    module: module.path().to_path_buf(),
                })??;
            factory.instantiate(class, &reference.settings)?
        };

        Ok(Arc::from(handler))
    }

    /// Resolve, instantiate and configure a middleware.
    pub fn resolve_middleware(
        &self,
        reference: &PluginReference,
    ) -> Result<Arc<dyn Middleware>, PluginError> {
        let class = reference.class_name.trim();
        if class.is_empty() {
            return Err(PluginError::InvalidEntry("empty middleware class name".to_string()));
        }

        let middleware = if let Some(factory) = self.builtins.middleware(class) {
            factory?.instantiate(class, &reference.settings)?
        } else {
            let module = self.module_for(class, reference.module.as_deref())?;
            let factory = module
                .catalog()
                .middleware(class)
                .ok_or_else(|| ResolutionError::ClassNotFound {
                    class: class.to_string(),
                    module: module.path().to_path_buf(),
                })??;
            factory.instantiate(class, &reference.settings)?
        };

        Ok(Arc::from(middleware))
    }

    fn module_for(&self, class: &str, module: Option<&Path>) -> Result<Arc<PluginModule>, ResolutionError> {
        let Some(path) = module else {
            return Err(ResolutionError::UnknownClass(class.to_string()));
        };

        let key = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        if let Some(loaded) = self.modules.get(&key) {
            return Ok(Arc::clone(loaded.value()));
        }

        let entry = self
            .modules
            .entry(key.clone())
            .or_try_insert_with(|| PluginModule::load(&key).map(Arc::new))?;
        Ok(Arc::clone(entry.value()))
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("builtins", &self.builtins)
            .field("modules", &self.modules.len())
            .finish()
    }
}
