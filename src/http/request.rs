//! Inbound request model.
//!
//! # Responsibilities
//! - Carry everything the pipeline needs about one inbound request
//! - Assign a unique request ID for log correlation
//! - Split the request target into path and query
//!
//! # Design Decisions
//! - Body is fully buffered by the listener before dispatch
//! - Immutable once handed to the queue; handlers only read it

use std::net::SocketAddr;

use axum::body::Bytes;
use axum::http::header::IntoHeaderName;
use axum::http::{HeaderMap, HeaderValue, Method};
use uuid::Uuid;

/// Header used to correlate a request across log lines.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Unique identifier assigned to every inbound request.
pub type RequestId = Uuid;

/// An inbound HTTP request.
#[derive(Debug, Clone)]
pub struct Request {
    id: RequestId,
    client: SocketAddr,
    method: Method,
    path: String,
    query: Option<String>,
    headers: HeaderMap,
    body: Bytes,
}

impl Request {
    /// Create a request for `target` (path with optional `?query`) with no headers or body.
    pub fn new(client: SocketAddr, method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (target, None),
        };
        Self::from_parts(client, method, path, query, HeaderMap::new(), Bytes::new())
    }

    /// Assemble a request from already-split parts, as produced by the listener.
    ///
    /// A client-supplied `x-request-id` is reused when it parses as a UUID.
    pub fn from_parts(
        client: SocketAddr,
        method: Method,
        path: &str,
        query: Option<String>,
        headers: HeaderMap,
        body: Bytes,
    ) -> Self {
        let id = headers
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v).ok())
            .unwrap_or_else(Uuid::new_v4);

        let path = if path.is_empty() { "/" } else { path };

        Self {
            id,
            client,
            method,
            path: path.to_string(),
            query: query.filter(|q| !q.is_empty()),
            headers,
            body,
        }
    }

    /// Builder-style header insertion.
    pub fn with_header<K: IntoHeaderName>(mut self, name: K, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Builder-style body replacement.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Remote address of the client; its IP is the rate-limiting identity.
    pub fn client(&self) -> SocketAddr {
        self.client
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Absolute path component of the request target, without the query.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header value as a string, if present and valid visible ASCII.
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> SocketAddr {
        "127.0.0.1:5000".parse().unwrap()
    }

    #[test]
    fn splits_target_into_path_and_query() {
        let req = Request::new(client(), Method::GET, "/search?q=rust&page=2");
        assert_eq!(req.path(), "/search");
        assert_eq!(req.query(), Some("q=rust&page=2"));

        let req = Request::new(client(), Method::GET, "/plain?");
        assert_eq!(req.path(), "/plain");
        assert_eq!(req.query(), None);
    }

    #[test]
    fn empty_path_becomes_root() {
        let req = Request::new(client(), Method::GET, "");
        assert_eq!(req.path(), "/");
    }

    #[test]
    fn reuses_valid_client_request_id() {
        let id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(X_REQUEST_ID, HeaderValue::from_str(&id.to_string()).unwrap());
        let req = Request::from_parts(client(), Method::GET, "/", None, headers, Bytes::new());
        assert_eq!(req.id(), id);

        let mut headers = HeaderMap::new();
        headers.insert(X_REQUEST_ID, HeaderValue::from_static("not-a-uuid"));
        let req = Request::from_parts(client(), Method::GET, "/", None, headers, Bytes::new());
        assert_ne!(req.id(), Uuid::nil());
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let req = Request::new(client(), Method::GET, "/")
            .with_header("x-api-key", HeaderValue::from_static("secret"));
        assert_eq!(req.header_str("X-API-Key"), Some("secret"));
        assert_eq!(req.header_str("missing"), None);
    }
}
