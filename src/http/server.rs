//! Server core: accept loop, request queue and worker pool.
//!
//! # Responsibilities
//! - Own the live `ServerContext` (configuration + generation)
//! - Move accepted requests from a `Listener` into the `RequestQueue`
//! - Apply configuration updates by swapping generations, on a task of
//!   their own so a slow reload never stalls accepting
//! - Shut down in order: stop accepting, drain the queue, join the workers
//!
//! # Design Decisions
//! - Queue back-pressure is the default; `reject_when_full` answers 503 instead
//! - Listener, port, worker and queue settings are read once at startup; a
//!   reload only replaces routes and middleware

use std::sync::Arc;

use axum::http::StatusCode;
use tokio::sync::{broadcast, mpsc};

use crate::config::{ConfigError, ServerConfig};
use crate::dispatch::{Dispatcher, QueueError, RequestQueue, WorkerPool};
use crate::http::RequestContext;
use crate::lifecycle::ServerContext;
use crate::net::{Listener, ListenerError};
use crate::observability::metrics;
use crate::plugin::PluginRegistry;

/// Errors that prevent the server from starting or end [`HttpServer::run`].
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("logging setup failed: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),

    #[error("invalid address: {0}")]
    Address(#[from] std::net::AddrParseError),

    #[error("listener failed: {0}")]
    Listener(#[from] ListenerError),

    #[error("TLS setup failed: {0}")]
    Tls(#[source] std::io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The request-processing engine, independent of any transport.
#[derive(Debug)]
pub struct HttpServer {
    context: Arc<ServerContext>,
    queue: Arc<RequestQueue>,
    workers: usize,
    reject_when_full: bool,
}

impl HttpServer {
    /// Build the first generation from `config` and size the queue and pool.
    pub fn new(config: ServerConfig, registry: PluginRegistry) -> Self {
        let workers = config.worker_count();
        let queue = Arc::new(RequestQueue::with_capacity(config.queue_bound()));
        let reject_when_full = config.reject_when_full;

        tracing::info!(
            workers,
            queue_capacity = ?queue.capacity(),
            reject_when_full,
            "Server configured"
        );

        Self {
            context: Arc::new(ServerContext::new(config, registry)),
            queue,
            workers,
            reject_when_full,
        }
    }

    pub fn context(&self) -> &Arc<ServerContext> {
        &self.context
    }

    pub fn queue(&self) -> &Arc<RequestQueue> {
        &self.queue
    }

    /// Run until `shutdown` fires or the listener closes.
    ///
    /// On exit every request already accepted is processed and answered
    /// before this returns. A listener failure ends the accept loop the same
    /// way and is returned once the drain completes.
    pub async fn run<L: Listener>(
        self,
        mut listener: L,
        config_updates: mpsc::UnboundedReceiver<ServerConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&self.context)));
        let pool = WorkerPool::start(self.workers, Arc::clone(&self.queue), dispatcher);
        let reloader = tokio::spawn(apply_updates(
            Arc::clone(&self.context),
            config_updates,
            self.workers,
            self.queue.capacity(),
        ));

        tracing::info!(generation = self.context.generation().id(), "Server running");

        let mut failure = None;
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown requested, stopping accept loop");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok(ctx) => self.submit(ctx).await,
                    Err(ListenerError::Closed) => {
                        tracing::info!("Listener closed");
                        break;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Listener failed, stopping accept loop");
                        failure = Some(e);
                        break;
                    }
                },
            }
        }

        reloader.abort();
        listener.stop();
        let mut drained = 0usize;
        while let Ok(ctx) = listener.accept().await {
            self.submit(ctx).await;
            drained += 1;
        }

        self.queue.close();
        tracing::info!(drained, pending = self.queue.len(), "Draining request queue");
        pool.join().await;

        tracing::info!("Server stopped");
        match failure {
            Some(e) => Err(ServerError::Listener(e)),
            None => Ok(()),
        }
    }

    async fn submit(&self, ctx: RequestContext) {
        let result = if self.reject_when_full {
            self.queue.try_enqueue(ctx)
        } else {
            self.queue.enqueue(ctx).await
        };

        match result {
            Ok(()) => metrics::record_queue_depth(self.queue.len()),
            Err(e) => {
                let reason = match &e {
                    QueueError::Full(_) => "queue_full",
                    QueueError::Closed(_) => "queue_closed",
                };
                let mut ctx = e.into_inner();
                tracing::warn!(
                    request_id = %ctx.request().id(),
                    path = %ctx.request().path(),
                    reason,
                    "Request rejected"
                );
                metrics::record_queue_rejected();

                ctx.respond(StatusCode::SERVICE_UNAVAILABLE);
                if let Err(e) = ctx.finish() {
                    tracing::debug!(request_id = %ctx.request().id(), error = %e, "Client gone before rejection");
                }
            }
        }
    }
}

/// Apply configuration updates in arrival order, off the accept path.
///
/// Building a generation constructs and configures every handler, which may
/// touch the filesystem, so each reload runs on the blocking pool.
async fn apply_updates(
    context: Arc<ServerContext>,
    mut updates: mpsc::UnboundedReceiver<ServerConfig>,
    workers: usize,
    capacity: Option<usize>,
) {
    while let Some(config) = updates.recv().await {
        let current = context.config();
        if config.port != current.port
            || config.https_port != current.https_port
            || config.bind_address != current.bind_address
            || config.worker_count() != workers
            || config.queue_bound() != capacity
        {
            tracing::warn!("Listener, worker and queue settings only take effect on restart");
        }

        let context = Arc::clone(&context);
        match tokio::task::spawn_blocking(move || context.reload(config)).await {
            Ok(generation) => tracing::debug!(generation = generation.id(), "Configuration applied"),
            Err(e) => tracing::error!(error = %e, "Configuration reload failed"),
        }
    }
}
