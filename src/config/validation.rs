//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (workers > 0, timeouts > 0, ports distinct)
//! - Check TLS settings are complete when HTTPS is enabled
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Per-route and per-middleware problems are not fatal here; they are
//!   logged and skipped when the generation is built

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::config::schema::ServerConfig;

/// A single semantic problem in a configuration document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.bind_address.parse::<IpAddr>().is_err() {
        errors.push(ValidationError::new(
            "bind_address",
            format!("`{}` is not an IP address", config.bind_address),
        ));
    }

    if config.workers == Some(0) {
        errors.push(ValidationError::new("workers", "must be at least 1"));
    }

    if config.request_timeout_secs == 0 {
        errors.push(ValidationError::new("request_timeout_secs", "must be greater than 0"));
    }

    if config.max_body_bytes == 0 {
        errors.push(ValidationError::new("max_body_bytes", "must be greater than 0"));
    }

    if let Some(tls_port) = config.tls_port() {
        if tls_port == config.port {
            errors.push(ValidationError::new(
                "https_port",
                format!("port {tls_port} is already used for plain HTTP"),
            ));
        }
        if config.certificate_path.is_none() {
            errors.push(ValidationError::new(
                "certificate_path",
                "required when https_port is set",
            ));
        }
        if config.certificate_key_path.is_none() {
            errors.push(ValidationError::new(
                "certificate_key_path",
                "required when https_port is set",
            ));
        }
    }

    if config.observability.log_level.trim().is_empty() {
        errors.push(ValidationError::new("observability.log_level", "must not be empty"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("`{}` is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
