//! Listener contract between transports and the accept loop.
//!
//! # Responsibilities
//! - Define how the server obtains inbound requests (`Listener`)
//! - Provide a channel-backed listener fed by any transport front-end
//! - Bind TCP sockets for the HTTP front-ends
//!
//! # Design Decisions
//! - Transports never touch the queue; they submit through a `ListenerHandle`
//!   and await the finalised response on a one-shot channel
//! - The channel is bounded, so a full request queue pushes back on the
//!   transport instead of growing memory
//! - After `stop`, `accept` still yields already-submitted requests, then
//!   reports `Closed`

use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};

use crate::http::{Request, RequestContext, Response};

/// Error type for listener operations.
#[derive(Debug)]
pub enum ListenerError {
    /// Failed to bind to address.
    Bind(std::io::Error),
    /// Failed to accept a request.
    Accept(std::io::Error),
    /// The listener was stopped or every submitter is gone.
    Closed,
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::Bind(e) => write!(f, "Failed to bind: {}", e),
            ListenerError::Accept(e) => write!(f, "Failed to accept: {}", e),
            ListenerError::Closed => write!(f, "Listener closed"),
        }
    }
}

impl std::error::Error for ListenerError {}

/// Source of inbound requests for the accept loop.
#[async_trait]
pub trait Listener: Send {
    /// Wait for the next request.
    async fn accept(&mut self) -> Result<RequestContext, ListenerError>;

    /// Stop taking new requests.
    fn stop(&mut self);
}

/// Listener fed through [`ListenerHandle`]s.
#[derive(Debug)]
pub struct ChannelListener {
    rx: mpsc::Receiver<RequestContext>,
}

#[async_trait]
impl Listener for ChannelListener {
    async fn accept(&mut self) -> Result<RequestContext, ListenerError> {
        self.rx.recv().await.ok_or(ListenerError::Closed)
    }

    fn stop(&mut self) {
        self.rx.close();
    }
}

/// Submitting side of a [`ChannelListener`]; cheap to clone.
#[derive(Debug, Clone)]
pub struct ListenerHandle {
    tx: mpsc::Sender<RequestContext>,
}

impl ListenerHandle {
    /// Hand a request to the server. Resolves once it has been accepted into
    /// the listener buffer; the returned receiver yields the response.
    pub async fn submit(&self, request: Request) -> Result<oneshot::Receiver<Response>, ListenerError> {
        let (ctx, rx) = RequestContext::new(request);
        self.tx.send(ctx).await.map_err(|_| ListenerError::Closed)?;
        Ok(rx)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Create a connected handle/listener pair buffering up to `buffer` requests.
pub fn channel(buffer: usize) -> (ListenerHandle, ChannelListener) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    (ListenerHandle { tx }, ChannelListener { rx })
}

/// Bind a TCP socket for a front-end.
pub async fn bind(address: &str) -> Result<TcpListener, ListenerError> {
    let addr: SocketAddr = address
        .parse()
        .map_err(|e| ListenerError::Bind(std::io::Error::new(std::io::ErrorKind::InvalidInput, e)))?;

    let listener = TcpListener::bind(addr).await.map_err(ListenerError::Bind)?;
    let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;

    tracing::info!(address = %local_addr, "Listener bound");
    Ok(listener)
}
