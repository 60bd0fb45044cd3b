//! Outbound response model.
//!
//! # Responsibilities
//! - Buffer status, headers and body while the pipeline runs
//! - Apply the negotiated content encoding exactly once at finalisation
//!
//! # Design Decisions
//! - The body is buffered in full; compression needs the final size
//! - Handlers never touch `Content-Length`, it is derived at finalisation

use axum::http::header::{self, IntoHeaderName};
use axum::http::{HeaderMap, HeaderValue, StatusCode};

use crate::http::compression::ResponseEncoder;
use crate::http::error::TransportError;

/// A response under construction.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    encoder: Option<ResponseEncoder>,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    /// An empty `200 OK` response.
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
            encoder: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn set_header<K: IntoHeaderName>(&mut self, name: K, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    /// Set `Content-Type`; values that are not valid header text are ignored.
    pub fn set_content_type(&mut self, content_type: &str) {
        if let Ok(value) = HeaderValue::from_str(content_type) {
            self.headers.insert(header::CONTENT_TYPE, value);
        }
    }

    /// Append bytes to the body.
    pub fn write(&mut self, bytes: &[u8]) {
        self.body.extend_from_slice(bytes);
    }

    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) {
        self.body = body.into();
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn set_encoder(&mut self, encoder: ResponseEncoder) {
        self.encoder = Some(encoder);
    }

    pub fn encoder(&self) -> Option<&ResponseEncoder> {
        self.encoder.as_ref()
    }

    /// Discard whatever was produced so far and answer with a plain-text status line,
    /// e.g. `404 Not Found`.
    pub fn reset_with(&mut self, status: StatusCode) {
        self.status = status;
        self.headers.clear();
        self.encoder = None;
        self.body = match status.canonical_reason() {
            Some(reason) => format!("{} {}", status.as_u16(), reason).into_bytes(),
            None => status.as_u16().to_string().into_bytes(),
        };
        self.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
    }

    /// Apply the installed encoder (if any) and fix up the framing headers.
    ///
    /// An encoding failure leaves the body uncompressed; the error is returned
    /// so the caller can log it, the response itself stays deliverable.
    pub fn finalize(&mut self) -> Result<(), TransportError> {
        let mut result = Ok(());

        if let Some(encoder) = self.encoder.take() {
            let already_encoded = self.headers.contains_key(header::CONTENT_ENCODING);
            if !already_encoded && encoder.applies_to(self.body.len()) {
                match encoder.encode(&self.body) {
                    Ok(encoded) => {
                        self.body = encoded;
                        self.headers.insert(
                            header::CONTENT_ENCODING,
                            HeaderValue::from_static(encoder.coding().as_str()),
                        );
                        self.headers.append(
                            header::VARY,
                            HeaderValue::from_static("accept-encoding"),
                        );
                    }
                    Err(e) => result = Err(TransportError::Encode(e)),
                }
            }
        }

        self.headers
            .insert(header::CONTENT_LENGTH, HeaderValue::from(self.body.len()));
        result
    }

    /// Split into parts for the listener.
    pub fn into_parts(self) -> (StatusCode, HeaderMap, Vec<u8>) {
        (self.status, self.headers, self.body)
    }
}
