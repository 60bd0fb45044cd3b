//! Dynamic plugin modules.
//!
//! A module is a `cdylib` built against this crate that exports
//!
//! ```ignore
//! #[no_mangle]
//! pub fn register_plugins(catalog: &mut webhost::plugin::PluginCatalog) { ... }
//! ```
//!
//! The library stays loaded for as long as the `PluginModule` lives, which is
//! as long as the owning `PluginRegistry`.

use std::fmt;
use std::path::{Path, PathBuf};

use libloading::{Library, Symbol};

use crate::plugin::{PluginCatalog, ResolutionError};

/// Symbol every plugin module must export.
pub const ENTRY_POINT: &[u8] = b"register_plugins";

type RegisterFn = fn(&mut PluginCatalog);

/// A loaded dynamic library and the classes it registered.
pub struct PluginModule {
    path: PathBuf,
    catalog: PluginCatalog,
    // Declared last: the catalog's constructors point into this library and
    // must be dropped before it is unloaded.
    _library: Library,
}

impl PluginModule {
    /// Load the library at `path` and run its entry point.
    pub fn load(path: &Path) -> Result<Self, ResolutionError> {
        tracing::info!(module = %path.display(), "Loading plugin module");

        // SAFETY: loading a library runs its initialisers; plugin modules are
        // trusted code named by the operator's configuration.
        let library = unsafe { Library::new(path) }.map_err(|source| ResolutionError::ModuleLoad {
            module: path.to_path_buf(),
            source,
        })?;

        let mut catalog = PluginCatalog::new();
        {
            // SAFETY: the entry point signature is part of the module contract.
            let register: Symbol<RegisterFn> = unsafe { library.get(ENTRY_POINT) }
                .map_err(|_| ResolutionError::MissingEntryPoint(path.to_path_buf()))?;
            register(&mut catalog);
        }

        tracing::info!(
            module = %path.display(),
            classes = catalog.len(),
            "Plugin module loaded"
        );

        Ok(Self {
            path: path.to_path_buf(),
            catalog,
            _library: library,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn catalog(&self) -> &PluginCatalog {
        &self.catalog
    }
}

impl fmt::Debug for PluginModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginModule")
            .field("path", &self.path)
            .field("classes", &self.catalog.len())
            .finish()
    }
}
