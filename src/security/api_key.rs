//! API-key authentication middleware.

use async_trait::async_trait;
use axum::http::StatusCode;

use crate::http::{RequestContext, RequestError};
use crate::plugin::{settings, Configurable, ConfigurationError, Middleware, Settings};

pub const DEFAULT_HEADER: &str = "X-API-Key";

/// Rejects requests to protected paths that do not carry the configured key.
///
/// Settings: `ApiKey` (required), `Path` (list of protected path prefixes;
/// absent means every path is protected), `HeaderName` (default `X-API-Key`).
#[derive(Debug)]
pub struct ApiKeyGuard {
    api_key: String,
    protected: Option<Vec<String>>,
    header: String,
}

impl Default for ApiKeyGuard {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            protected: None,
            header: DEFAULT_HEADER.to_string(),
        }
    }
}

impl ApiKeyGuard {
    pub const CLASS_NAME: &'static str = "APIAuthenticationModule";

    pub fn new(api_key: impl Into<String>, protected: Option<Vec<String>>) -> Self {
        Self {
            api_key: api_key.into(),
            protected,
            ..Self::default()
        }
    }

    /// Prefixes compare ASCII case-insensitively, the same way routes match,
    /// so a case variant of a protected path is still protected.
    pub fn is_protected(&self, path: &str) -> bool {
        match &self.protected {
            None => true,
            Some(prefixes) => prefixes.iter().any(|prefix| {
                path.get(..prefix.len())
                    .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
            }),
        }
    }

    fn key_matches(&self, presented: Option<&str>) -> bool {
        match presented {
            Some(key) => constant_time_eq(key.as_bytes(), self.api_key.as_bytes()),
            None => false,
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

impl Configurable for ApiKeyGuard {
    fn configure(&mut self, settings: &Settings) -> Result<(), ConfigurationError> {
        let key = settings::require_str(settings, "ApiKey")?;
        if key.is_empty() {
            return Err(ConfigurationError::invalid("ApiKey", "must not be empty"));
        }
        self.api_key = key;
        self.protected = settings::optional_str_list(settings, "Path")?;
        if let Some(header) = settings::optional_str(settings, "HeaderName")? {
            if axum::http::HeaderName::from_bytes(header.as_bytes()).is_err() {
                return Err(ConfigurationError::invalid("HeaderName", "not a valid header name"));
            }
            self.header = header;
        }
        Ok(())
    }
}

#[async_trait]
impl Middleware for ApiKeyGuard {
    async fn process_request(&self, ctx: &mut RequestContext) -> Result<bool, RequestError> {
        let request = ctx.request();
        if !self.is_protected(request.path()) {
            return Ok(true);
        }
        if self.key_matches(request.header_str(&self.header)) {
            return Ok(true);
        }

        tracing::warn!(
            request_id = %request.id(),
            client = %request.client(),
            path = %request.path(),
            "Missing or invalid API key"
        );
        ctx.respond(StatusCode::UNAUTHORIZED);
        Ok(false)
    }
}
