//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from TOML or JSON files.
//! Field names are snake_case; the PascalCase names of older JSON documents
//! (`Port`, `MaxThreads`, `RouteConfigs`, ...) are accepted as aliases.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dispatch::default_pool_size;
use crate::plugin::{PluginReference, Settings};

/// Root configuration for the server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Plain HTTP port. `0` picks an ephemeral port.
    #[serde(alias = "Port")]
    pub port: u16,

    /// HTTPS port; requires `certificate_path` and `certificate_key_path`.
    #[serde(alias = "HttpsPort")]
    pub https_port: Option<u16>,

    /// Address both listeners bind to.
    #[serde(alias = "BindAddress")]
    pub bind_address: String,

    /// Worker count; defaults to two per CPU core.
    #[serde(alias = "MaxThreads")]
    pub workers: Option<usize>,

    /// Request queue bound; `0` means unbounded.
    #[serde(alias = "QueueCapacity")]
    pub queue_capacity: usize,

    /// Answer `503` instead of waiting when the queue is full.
    #[serde(alias = "RejectWhenFull")]
    pub reject_when_full: bool,

    /// Largest request body accepted by the listener.
    pub max_body_bytes: usize,

    /// Total time allowed for one request at the listener.
    pub request_timeout_secs: u64,

    /// PEM certificate chain.
    #[serde(alias = "CertificatePath")]
    pub certificate_path: Option<PathBuf>,

    /// PEM private key.
    #[serde(alias = "CertificateKeyPath")]
    pub certificate_key_path: Option<PathBuf>,

    /// Only meaningful for encrypted key stores, which are not supported.
    #[serde(alias = "CertificatePassword")]
    pub certificate_password: Option<String>,

    /// Route definitions mapping paths to handlers.
    #[serde(alias = "RouteConfigs")]
    pub routes: Vec<RouteConfig>,

    /// Middleware chain, in execution order.
    #[serde(alias = "MiddlewareConfigs")]
    pub middleware: Vec<MiddlewareConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Reload automatically when the configuration file changes.
    pub watch_config: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            https_port: None,
            bind_address: "0.0.0.0".to_string(),
            workers: None,
            queue_capacity: 1000,
            reject_when_full: false,
            max_body_bytes: 2 * 1024 * 1024,
            request_timeout_secs: 30,
            certificate_path: None,
            certificate_key_path: None,
            certificate_password: None,
            routes: Vec::new(),
            middleware: Vec::new(),
            observability: ObservabilityConfig::default(),
            watch_config: true,
        }
    }
}

impl ServerConfig {
    /// `bind_address:port` for the plain HTTP listener.
    pub fn http_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// HTTPS port, treating `0` as disabled.
    pub fn tls_port(&self) -> Option<u16> {
        self.https_port.filter(|port| *port != 0)
    }

    /// `bind_address:https_port`, when HTTPS is enabled.
    pub fn https_address(&self) -> Option<String> {
        self.tls_port()
            .map(|port| format!("{}:{}", self.bind_address, port))
    }

    /// Effective number of workers.
    pub fn worker_count(&self) -> usize {
        self.workers
            .filter(|n| *n > 0)
            .unwrap_or_else(default_pool_size)
    }

    /// Effective queue bound, `None` for unbounded.
    pub fn queue_bound(&self) -> Option<usize> {
        (self.queue_capacity > 0).then_some(self.queue_capacity)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Route configuration mapping a path pattern to a handler class.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RouteConfig {
    /// Exact path, or a prefix ending in `*`.
    #[serde(alias = "Path")]
    pub path: String,

    /// Accepted methods; empty or `"*"` accepts any.
    #[serde(alias = "Methods")]
    pub methods: Vec<String>,

    /// Free-form label used in logs.
    #[serde(alias = "HandlerType")]
    pub handler_type: Option<String>,

    /// Dynamic library providing the class; absent for built-ins.
    #[serde(alias = "AssemblyName", alias = "module")]
    pub assembly_name: Option<PathBuf>,

    #[serde(alias = "ClassName")]
    pub class_name: String,

    #[serde(alias = "Settings")]
    pub settings: Settings,
}

impl RouteConfig {
    pub fn reference(&self) -> PluginReference {
        PluginReference {
            module: non_empty(&self.assembly_name),
            class_name: self.class_name.clone(),
            settings: self.settings.clone(),
        }
    }

    /// Name for log lines.
    pub fn label(&self) -> &str {
        self.handler_type
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.class_name)
    }
}

/// One entry of the middleware chain.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct MiddlewareConfig {
    #[serde(alias = "Name")]
    pub name: String,

    #[serde(alias = "AssemblyName", alias = "module")]
    pub assembly_name: Option<PathBuf>,

    #[serde(alias = "ClassName")]
    pub class_name: String,

    #[serde(alias = "Settings")]
    pub settings: Settings,
}

impl MiddlewareConfig {
    pub fn reference(&self) -> PluginReference {
        PluginReference {
            module: non_empty(&self.assembly_name),
            class_name: self.class_name.clone(),
            settings: self.settings.clone(),
        }
    }

    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.class_name
        } else {
            &self.name
        }
    }
}

fn non_empty(path: &Option<PathBuf>) -> Option<PathBuf> {
    path.as_ref()
        .filter(|p| !p.as_os_str().is_empty())
        .cloned()
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level or filter directive (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
