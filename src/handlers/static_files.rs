//! Static file serving from a web root.
//!
//! # Responsibilities
//! - Map request paths onto files below the configured web root
//! - Serve file bytes through the shared [`FileCache`]
//! - Keep the cache coherent with the filesystem via a [`FileWatcher`]
//!
//! # Design Decisions
//! - Any `..`, root or prefix component in the request path is refused with 403
//! - Existence is checked on every request, so a deleted file is a 404 even
//!   before its change notification arrives
//! - Caching is only enabled while a watch is active; without `WatchFiles`,
//!   or when the watch fails, every request reads from disk

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{header, HeaderValue, StatusCode};
use time::macros::format_description;
use time::OffsetDateTime;

use crate::cache::{FileCache, FileWatcher};
use crate::http::{Request, RequestError, Response};
use crate::plugin::{settings, Configurable, ConfigurationError, Handler, Settings};

pub const DEFAULT_CACHE_EXPIRATION_MINUTES: u64 = 5;
pub const DEFAULT_DOCUMENT: &str = "index.html";

const IMAGE_CACHE_CONTROL: &str = "public, max-age=86400";

/// Serves files below `WebRoot`.
///
/// Settings: `WebRoot` (required), `CacheExpirationMinutes` (default 5, `0`
/// disables expiry), `WatchFiles` (default true), `DefaultDocument` (default
/// `index.html`).
pub struct StaticFilesHandler {
    web_root: PathBuf,
    default_document: String,
    expiration: Duration,
    cache: Arc<FileCache>,
    caching: bool,
    watcher: Option<FileWatcher>,
}

impl Default for StaticFilesHandler {
    fn default() -> Self {
        let expiration = Duration::from_secs(DEFAULT_CACHE_EXPIRATION_MINUTES * 60);
        Self {
            web_root: PathBuf::new(),
            default_document: DEFAULT_DOCUMENT.to_string(),
            expiration,
            cache: Arc::new(FileCache::new(Some(expiration))),
            caching: false,
            watcher: None,
        }
    }
}

impl StaticFilesHandler {
    pub const CLASS_NAME: &'static str = "StaticFilesHandler";

    pub fn web_root(&self) -> &Path {
        &self.web_root
    }

    pub fn cache(&self) -> &Arc<FileCache> {
        &self.cache
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.is_some()
    }

    /// Absolute file path for a request path, or `None` when it tries to leave
    /// the web root.
    fn resolve_path(&self, request_path: &str) -> Option<PathBuf> {
        let mut resolved = self.web_root.clone();
        let relative = request_path.trim_start_matches('/');

        for component in Path::new(relative).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
            }
        }

        if relative.is_empty() || request_path.ends_with('/') {
            resolved.push(&self.default_document);
        }
        Some(resolved)
    }

    async fn load(&self, path: &Path) -> Result<Bytes, RequestError> {
        if self.caching {
            if let Some(content) = self.cache.get(path) {
                return Ok(content);
            }
        }

        let ticket = self.cache.ticket();
        let content = Bytes::from(tokio::fs::read(path).await?);
        if self.caching {
            self.cache.put_fresh(ticket, path, content.clone());
        }
        Ok(content)
    }

    fn expires_header(&self) -> Option<HeaderValue> {
        let format = format_description!(
            "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
        );
        let expires = OffsetDateTime::now_utc() + self.expiration;
        expires
            .format(format)
            .ok()
            .and_then(|s| HeaderValue::from_str(&s).ok())
    }
}

impl Configurable for StaticFilesHandler {
    fn configure(&mut self, settings: &Settings) -> Result<(), ConfigurationError> {
        let root = settings::require_str(settings, "WebRoot")?;
        let root = std::fs::canonicalize(&root)
            .map_err(|e| ConfigurationError::invalid("WebRoot", format!("{root}: {e}")))?;
        if !root.is_dir() {
            return Err(ConfigurationError::invalid(
                "WebRoot",
                format!("{} is not a directory", root.display()),
            ));
        }

        let minutes = settings::optional_u64(settings, "CacheExpirationMinutes")?
            .unwrap_or(DEFAULT_CACHE_EXPIRATION_MINUTES);
        self.expiration = Duration::from_secs(minutes.saturating_mul(60));
        let sliding = (minutes > 0).then_some(self.expiration);
        self.cache = Arc::new(FileCache::new(sliding));

        if let Some(document) = settings::optional_str(settings, "DefaultDocument")? {
            if document.is_empty() || document.contains('/') {
                return Err(ConfigurationError::invalid(
                    "DefaultDocument",
                    "must be a plain file name",
                ));
            }
            self.default_document = document;
        }

        let watch = settings::optional_bool(settings, "WatchFiles")?.unwrap_or(true);
        self.watcher = None;
        self.caching = false;
        if watch {
            let cache = Arc::clone(&self.cache);
            match FileWatcher::watch(&root, move |event| cache.handle_event(&event)) {
                Ok(watcher) => {
                    self.watcher = Some(watcher);
                    self.caching = true;
                }
                Err(e) => {
                    tracing::warn!(
                        web_root = %root.display(),
                        error = %e,
                        "Cannot watch web root; file caching disabled"
                    );
                }
            }
        }

        tracing::debug!(
            web_root = %root.display(),
            cache_minutes = minutes,
            caching = self.caching,
            "Static files handler configured"
        );
        self.web_root = root;
        Ok(())
    }
}

#[async_trait]
impl Handler for StaticFilesHandler {
    async fn handle_request(&self, request: &Request, response: &mut Response) -> Result<(), RequestError> {
        if self.web_root.as_os_str().is_empty() {
            return Err(RequestError::handler("StaticFilesHandler has no WebRoot configured"));
        }

        let Some(path) = self.resolve_path(request.path()) else {
            tracing::warn!(
                request_id = %request.id(),
                path = %request.path(),
                "Path traversal attempt rejected"
            );
            response.reset_with(StatusCode::FORBIDDEN);
            return Ok(());
        };

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => {
                response.reset_with(StatusCode::NOT_FOUND);
                return Ok(());
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                response.reset_with(StatusCode::NOT_FOUND);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }

        let content = self.load(&path).await?;
        let mime = mime_guess::from_path(&path).first_or_octet_stream();

        response.set_status(StatusCode::OK);
        response.set_content_type(mime.essence_str());
        response.set_header(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
        response.set_header(header::X_FRAME_OPTIONS, HeaderValue::from_static("SAMEORIGIN"));
        if mime.type_() == mime_guess::mime::IMAGE {
            response.set_header(header::CACHE_CONTROL, HeaderValue::from_static(IMAGE_CACHE_CONTROL));
            if let Some(expires) = self.expires_header() {
                response.set_header(header::EXPIRES, expires);
            }
        }
        response.set_body(content.to_vec());
        Ok(())
    }
}
