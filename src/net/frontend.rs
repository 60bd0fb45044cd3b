//! HTTP/HTTPS front-end feeding the listener channel.
//!
//! # Responsibilities
//! - Terminate HTTP/1.1 and HTTP/2 (and TLS) via axum
//! - Buffer each request and submit it through a [`ListenerHandle`]
//! - Turn the finalised [`Response`] back into an axum response
//!
//! # Design Decisions
//! - A single fallback handler: routing belongs to the engine, not to axum
//! - Bodies above `max_body_bytes` are refused with 413 before submission
//! - A request the server can no longer take, or drops unanswered, gets 503

use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{header, StatusCode};
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::http::{Request, Response};
use crate::lifecycle::Shutdown;
use crate::net::listener::ListenerHandle;

/// How long the TLS front-end waits for in-flight connections on shutdown.
const TLS_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
struct FrontendState {
    handle: ListenerHandle,
    max_body: usize,
}

/// Build the axum app that forwards every request to the engine.
#[allow(deprecated)]
pub fn app(handle: ListenerHandle, config: &ServerConfig) -> Router {
    let state = FrontendState {
        handle,
        max_body: config.max_body_bytes,
    };

    Router::new()
        .fallback(accept_request)
        .with_state(state)
        .layer(TimeoutLayer::new(config.request_timeout()))
        .layer(TraceLayer::new_for_http())
}

/// Serve plain HTTP on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> Result<(), std::io::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "HTTP front-end starting");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!(address = %addr, "HTTP front-end stopped");
    Ok(())
}

/// Serve HTTPS on `addr` until `shutdown` is triggered.
pub async fn serve_tls(
    addr: SocketAddr,
    tls: RustlsConfig,
    app: Router,
    shutdown: Arc<Shutdown>,
) -> Result<(), std::io::Error> {
    let handle = axum_server::Handle::new();

    let signal = shutdown.signalled();
    let drain = handle.clone();
    tokio::spawn(async move {
        signal.await;
        drain.graceful_shutdown(Some(TLS_DRAIN_TIMEOUT));
    });

    tracing::info!(address = %addr, "HTTPS front-end starting");
    axum_server::bind_rustls(addr, tls)
        .handle(handle)
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .await?;

    tracing::info!(address = %addr, "HTTPS front-end stopped");
    Ok(())
}

async fn accept_request(State(state): State<FrontendState>, request: axum::extract::Request) -> axum::response::Response {
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0)
        .unwrap_or_else(|| SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)));

    let declared = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > state.max_body) {
        return status_only(StatusCode::PAYLOAD_TOO_LARGE);
    }

    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, state.max_body).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(client = %client, error = %e, "Request body rejected");
            return status_only(StatusCode::PAYLOAD_TOO_LARGE);
        }
    };

    let request = Request::from_parts(
        client,
        parts.method,
        parts.uri.path(),
        parts.uri.query().map(str::to_string),
        parts.headers,
        body,
    );
    let request_id = request.id();

    let reply = match state.handle.submit(request).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Server not accepting requests");
            return status_only(StatusCode::SERVICE_UNAVAILABLE);
        }
    };

    match reply.await {
        Ok(response) => into_axum(response),
        Err(_) => {
            tracing::warn!(request_id = %request_id, "Request dropped without a response");
            status_only(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

fn into_axum(response: Response) -> axum::response::Response {
    let (status, headers, body) = response.into_parts();
    let mut out = axum::response::Response::new(Body::from(body));
    *out.status_mut() = status;
    *out.headers_mut() = headers;
    out
}

fn status_only(status: StatusCode) -> axum::response::Response {
    let mut response = Response::new();
    response.reset_with(status);
    into_axum(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::listener::{channel, Listener};
    use axum::http::Method;
    use tower::ServiceExt;

    fn config(max_body: usize) -> ServerConfig {
        ServerConfig {
            max_body_bytes: max_body,
            ..ServerConfig::default()
        }
    }

    #[tokio::test]
    async fn forwards_request_and_returns_engine_response() {
        let (handle, mut listener) = channel(4);
        let app = app(handle, &config(1024));

        let engine = tokio::spawn(async move {
            let mut ctx = listener.accept().await.unwrap();
            assert_eq!(ctx.request().method(), Method::POST);
            assert_eq!(ctx.request().path(), "/echo");
            assert_eq!(ctx.request().query(), Some("a=1"));
            let body = ctx.request().body().clone();
            ctx.response_mut().set_status(StatusCode::CREATED);
            ctx.response_mut().set_body(body.to_vec());
            ctx.finish().unwrap();
        });

        let request = axum::http::Request::builder()
            .method(Method::POST)
            .uri("/echo?a=1")
            .body(Body::from("ping"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        engine.await.unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"ping");
    }

    #[tokio::test]
    async fn oversized_body_is_413() {
        let (handle, _listener) = channel(4);
        let app = app(handle, &config(4));

        let request = axum::http::Request::builder()
            .method(Method::POST)
            .uri("/")
            .body(Body::from("too long"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn closed_listener_is_503() {
        let (handle, listener) = channel(4);
        drop(listener);
        let app = app(handle, &config(1024));

        let request = axum::http::Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn dropped_request_is_503() {
        let (handle, mut listener) = channel(4);
        let app = app(handle, &config(1024));

        let engine = tokio::spawn(async move {
            let ctx = listener.accept().await.unwrap();
            drop(ctx);
        });

        let request = axum::http::Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        engine.await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
