//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{HeaderValue, Method, StatusCode};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use webhost::config::{MiddlewareConfig, RouteConfig, ServerConfig};
use webhost::http::{Request, RequestError, Response};
use webhost::lifecycle::ServerContext;
use webhost::net::{channel, ListenerHandle};
use webhost::plugin::{Handler, Settings};
use webhost::{HttpServer, PluginRegistry};

pub const CLIENT: &str = "10.0.0.7:41000";

pub fn request(method: Method, target: &str) -> Request {
    Request::new(CLIENT.parse().unwrap(), method, target)
}

pub fn get(target: &str) -> Request {
    request(Method::GET, target)
}

pub fn with_header(request: Request, name: &'static str, value: &'static str) -> Request {
    request.with_header(name, HeaderValue::from_static(value))
}

pub fn settings(value: Value) -> Settings {
    serde_json::from_value(value).unwrap()
}

pub fn route(path: &str, methods: &[&str], class: &str, settings_value: Value) -> RouteConfig {
    RouteConfig {
        path: path.to_string(),
        methods: methods.iter().map(|m| m.to_string()).collect(),
        class_name: class.to_string(),
        settings: settings(settings_value),
        ..Default::default()
    }
}

pub fn middleware(name: &str, class: &str, settings_value: Value) -> MiddlewareConfig {
    MiddlewareConfig {
        name: name.to_string(),
        class_name: class.to_string(),
        settings: settings(settings_value),
        ..Default::default()
    }
}

pub fn config(routes: Vec<RouteConfig>, middleware: Vec<MiddlewareConfig>) -> ServerConfig {
    ServerConfig {
        workers: Some(2),
        routes,
        middleware,
        watch_config: false,
        ..ServerConfig::default()
    }
}

/// Answers `200` with a fixed body and counts invocations.
pub struct CountingHandler {
    body: Vec<u8>,
    calls: Arc<AtomicUsize>,
    delay: Option<Duration>,
}

impl CountingHandler {
    pub fn new(body: impl Into<Vec<u8>>, calls: Arc<AtomicUsize>) -> Self {
        Self {
            body: body.into(),
            calls,
            delay: None,
        }
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl Handler for CountingHandler {
    async fn handle_request(&self, _request: &Request, response: &mut Response) -> Result<(), RequestError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        response.set_content_type("text/plain");
        response.set_body(self.body.clone());
        Ok(())
    }
}

pub struct PanickingHandler;

#[async_trait]
impl Handler for PanickingHandler {
    async fn handle_request(&self, _request: &Request, _response: &mut Response) -> Result<(), RequestError> {
        panic!("handler exploded");
    }
}

pub struct FailingHandler;

#[async_trait]
impl Handler for FailingHandler {
    async fn handle_request(&self, _request: &Request, response: &mut Response) -> Result<(), RequestError> {
        response.write(b"partial output");
        Err(RequestError::handler("backing store unavailable"))
    }
}

/// Register a `CountingHandler` class answering with `body`; returns its call counter.
pub fn register_counting(registry: &mut PluginRegistry, class: &str, body: &str) -> Arc<AtomicUsize> {
    register_counting_with(registry, class, body.as_bytes().to_vec(), None)
}

pub fn register_counting_with(
    registry: &mut PluginRegistry,
    class: &str,
    body: Vec<u8>,
    delay: Option<Duration>,
) -> Arc<AtomicUsize> {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    registry.catalog_mut().register_handler(class, move || {
        let handler = CountingHandler::new(body.clone(), Arc::clone(&counter));
        match delay {
            Some(delay) => handler.slow(delay),
            None => handler,
        }
    });
    calls
}

/// A server running on an in-process listener channel.
pub struct TestServer {
    pub handle: ListenerHandle,
    pub context: Arc<ServerContext>,
    pub updates: mpsc::UnboundedSender<ServerConfig>,
    shutdown: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

impl TestServer {
    pub fn start(config: ServerConfig, registry: PluginRegistry) -> Self {
        let server = HttpServer::new(config, registry);
        let context = Arc::clone(server.context());
        let (handle, listener) = channel(64);
        let (updates, updates_rx) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = broadcast::channel(1);

        let task = tokio::spawn(async move {
            server.run(listener, updates_rx, shutdown_rx).await.unwrap();
        });

        Self {
            handle,
            context,
            updates,
            shutdown,
            task,
        }
    }

    /// Submit a request and wait for its response.
    pub async fn send(&self, request: Request) -> Response {
        let reply = self.handle.submit(request).await.unwrap();
        tokio::time::timeout(Duration::from_secs(10), reply)
            .await
            .expect("response timed out")
            .expect("request dropped")
    }

    pub async fn status(&self, request: Request) -> StatusCode {
        self.send(request).await.status()
    }

    /// Trigger shutdown and wait for the server to drain.
    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        self.task.await.unwrap();
    }
}

/// Bind an ephemeral local port.
pub async fn ephemeral_listener() -> (tokio::net::TcpListener, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}
