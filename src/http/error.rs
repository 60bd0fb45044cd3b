//! Per-request error types.

use std::io;

use thiserror::Error;

/// Failure raised by a handler or middleware while processing one request.
///
/// The dispatch pipeline converts every variant into `500 Internal Server Error`
/// unless the response has already been finalised.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("handler failed: {0}")]
    Handler(String),

    #[error("middleware failed: {0}")]
    Middleware(String),
}

impl RequestError {
    pub fn handler(msg: impl Into<String>) -> Self {
        RequestError::Handler(msg.into())
    }

    pub fn middleware(msg: impl Into<String>) -> Self {
        RequestError::Middleware(msg.into())
    }
}

/// Failure while delivering a finalised response back to the listener.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to encode response body: {0}")]
    Encode(#[source] io::Error),

    #[error("client disconnected before the response was delivered")]
    ClientGone,
}
