//! Plugin resolution and configuration errors.

use std::path::PathBuf;

use thiserror::Error;

/// A plugin rejected its settings.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("missing required setting `{0}`")]
    MissingSetting(String),

    #[error("invalid value for setting `{setting}`: {reason}")]
    InvalidSetting { setting: String, reason: String },

    #[error("{0}")]
    Failed(String),
}

impl ConfigurationError {
    pub fn invalid(setting: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigurationError::InvalidSetting {
            setting: setting.into(),
            reason: reason.into(),
        }
    }
}

/// A plugin reference could not be turned into an instance.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("unknown built-in class `{0}` and no module given")]
    UnknownClass(String),

    #[error("failed to load module {}: {source}", module.display())]
    ModuleLoad {
        module: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("module {} does not export `register_plugins`", .0.display())]
    MissingEntryPoint(PathBuf),

    #[error("class `{class}` not found in module {}", module.display())]
    ClassNotFound { class: String, module: PathBuf },

    #[error("class `{class}` is not a {expected}")]
    WrongKind { class: String, expected: &'static str },
}

/// Any failure turning a configuration entry into a live plugin.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("failed to configure `{class}`: {source}")]
    Configuration {
        class: String,
        #[source]
        source: ConfigurationError,
    },

    #[error("invalid entry: {0}")]
    InvalidEntry(String),
}
