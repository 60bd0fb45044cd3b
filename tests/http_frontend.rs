//! Full-stack tests: reqwest → axum front-end → engine → handler.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::json;
use tokio::sync::mpsc;

use common::*;
use webhost::net::{channel, frontend};
use webhost::{HttpServer, PluginRegistry, Shutdown};

#[tokio::test]
async fn serves_requests_over_tcp_and_shuts_down() {
    let mut registry = PluginRegistry::with_builtins();
    register_counting(&mut registry, "Echo", "hello over tcp");

    let mut cfg = config(
        vec![
            route("/hello", &["GET"], "Echo", json!({})),
            route(
                "/dynamic/*",
                &[],
                "SampleDynamicContentHandler",
                json!({ "DefaultResponseType": "application/json" }),
            ),
        ],
        vec![],
    );
    cfg.max_body_bytes = 16;

    let shutdown = Arc::new(Shutdown::new());
    let server = HttpServer::new(cfg.clone(), registry);
    let (handle, listener) = channel(16);
    let (_updates_tx, updates) = mpsc::unbounded_channel();

    let (tcp, addr) = ephemeral_listener().await;
    let app = frontend::app(handle, &cfg);
    let front = tokio::spawn(frontend::serve(tcp, app, shutdown.signalled()));
    let engine = tokio::spawn(server.run(listener, updates, shutdown.subscribe()));

    let client = reqwest::Client::new();
    let base = format!("http://{addr}");

    let hello = client.get(format!("{base}/hello")).send().await.unwrap();
    assert_eq!(hello.status().as_u16(), StatusCode::OK.as_u16());
    assert_eq!(hello.text().await.unwrap(), "hello over tcp");

    let dynamic = client.get(format!("{base}/dynamic/page?q=1")).send().await.unwrap();
    assert_eq!(dynamic.status().as_u16(), 200);
    let payload: serde_json::Value = serde_json::from_str(&dynamic.text().await.unwrap()).unwrap();
    assert_eq!(payload["path"], "/dynamic/page");

    let wrong_method = client.post(format!("{base}/hello")).send().await.unwrap();
    assert_eq!(wrong_method.status().as_u16(), 404);

    let too_big = client
        .post(format!("{base}/dynamic/upload"))
        .body(vec![b'z'; 64])
        .send()
        .await
        .unwrap();
    assert_eq!(too_big.status().as_u16(), 413);

    drop(client);
    shutdown.trigger();
    engine.await.unwrap().unwrap();
    front.await.unwrap().unwrap();
}
