//! webhost: a pluggable HTTP server.
//!
//! # Architecture Overview
//!
//! ```text
//!   client ──▶ net::frontend (axum, TLS) ──▶ net::listener ──▶ http::server
//!                                                                  │
//!                                                      dispatch::queue (bounded)
//!                                                                  │
//!                                                      dispatch::pool (N workers)
//!                                                                  │
//!                            middleware chain ──▶ routing::router ──▶ handler
//!                                                                  │
//!   client ◀── net::frontend ◀──────── finalised response (compression, length)
//! ```
//!
//! Configuration is hot-reloaded: a changed file builds a new generation of
//! routes and middleware that is swapped in atomically.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;

use webhost::config::{load_config, watcher::ConfigWatcher};
use webhost::lifecycle::signals::spawn_signal_handler;
use webhost::net::{self, frontend, tls};
use webhost::observability::{logging, metrics};
use webhost::http::ServerError;
use webhost::{HttpServer, PluginRegistry, Shutdown};

#[derive(Debug, Parser)]
#[command(name = "webhost", version, about = "Pluggable HTTP server")]
struct Cli {
    /// Configuration file (TOML, or JSON by extension)
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Override the configured worker count
    #[arg(short, long)]
    workers: Option<usize>,

    /// Override the configured log level
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    let cli = Cli::parse();

    let mut config = load_config(&cli.config)?;
    if let Some(workers) = cli.workers {
        config.workers = Some(workers);
    }

    logging::init(&config.observability, cli.log_level.as_deref())?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        http = %config.http_address(),
        https = ?config.https_address(),
        routes = config.routes.len(),
        middleware = config.middleware.len(),
        "webhost starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    // Keep the watcher alive for the lifetime of the server.
    let (config_updates, _config_watcher) = if config.watch_config {
        let (watcher, updates) = ConfigWatcher::new(&cli.config);
        match watcher.run() {
            Ok(watcher) => (updates, Some(watcher)),
            Err(e) => {
                tracing::warn!(error = %e, "Config watching unavailable; reload disabled");
                (updates, None)
            }
        }
    } else {
        let (_tx, updates) = mpsc::unbounded_channel();
        (updates, None)
    };

    let shutdown = Arc::new(Shutdown::new());
    let server_shutdown = shutdown.subscribe();

    let server = HttpServer::new(config.clone(), PluginRegistry::with_builtins());
    let (handle, listener) = net::channel(config.worker_count());
    let app = frontend::app(handle, &config);

    let tcp = net::listener::bind(&config.http_address()).await?;
    let http_task = {
        let shutdown = Arc::clone(&shutdown);
        let app = app.clone();
        tokio::spawn(async move {
            if let Err(e) = frontend::serve(tcp, app, shutdown.signalled()).await {
                tracing::error!(error = %e, "HTTP front-end failed");
                shutdown.trigger();
            }
        })
    };

    let https_task = match (
        config.https_address(),
        config.certificate_path.as_deref(),
        config.certificate_key_path.as_deref(),
    ) {
        (Some(address), Some(cert), Some(key)) => {
            let addr: SocketAddr = address.parse()?;
            let tls_config = tls::load_tls_config(cert, key, config.certificate_password.as_deref())
                .await
                .map_err(ServerError::Tls)?;
            let shutdown = Arc::clone(&shutdown);
            Some(tokio::spawn(async move {
                if let Err(e) = frontend::serve_tls(addr, tls_config, app, Arc::clone(&shutdown)).await {
                    tracing::error!(error = %e, "HTTPS front-end failed");
                    shutdown.trigger();
                }
            }))
        }
        _ => None,
    };

    let signals = spawn_signal_handler(Arc::clone(&shutdown));

    server.run(listener, config_updates, server_shutdown).await?;

    if let Err(e) = http_task.await {
        tracing::error!(error = %e, "HTTP front-end task panicked");
    }
    if let Some(task) = https_task {
        if let Err(e) = task.await {
            tracing::error!(error = %e, "HTTPS front-end task panicked");
        }
    }
    signals.abort();

    tracing::info!("Shutdown complete");
    Ok(())
}
