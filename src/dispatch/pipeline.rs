//! Per-request dispatch.
//!
//! # Responsibilities
//! - Run the middleware chain in order, honouring short-circuits
//! - Route the request and invoke the matched handler
//! - Turn handler/middleware errors and panics into `500`
//! - Finalise the response exactly once and write the access log line
//!
//! # Design Decisions
//! - The generation is loaded once per request; a reload mid-request does not
//!   change which routes or middleware that request sees
//! - Panics are caught at this boundary so a worker never dies with a request

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use axum::http::StatusCode;
use futures_util::FutureExt;

use crate::dispatch::generation::Generation;
use crate::http::{RequestContext, RequestError};
use crate::lifecycle::startup::ServerContext;
use crate::observability::metrics;

/// Runs requests through the current generation.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    context: Arc<ServerContext>,
}

impl Dispatcher {
    pub fn new(context: Arc<ServerContext>) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &Arc<ServerContext> {
        &self.context
    }

    /// Process one request to completion. Never panics and never fails; every
    /// outcome ends in a delivered (or abandoned) response and a log line.
    pub async fn dispatch(&self, mut ctx: RequestContext) {
        let started = Instant::now();
        let generation = self.context.generation();

        let outcome = AssertUnwindSafe(run_pipeline(&generation, &mut ctx))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!(
                    request_id = %ctx.request().id(),
                    error = %e,
                    "Request processing failed"
                );
                if !ctx.is_finished() {
                    ctx.respond(StatusCode::INTERNAL_SERVER_ERROR);
                }
            }
            Err(panic) => {
                tracing::error!(
                    request_id = %ctx.request().id(),
                    panic = %panic_message(panic.as_ref()),
                    "Request processing panicked"
                );
                if !ctx.is_finished() {
                    ctx.respond(StatusCode::INTERNAL_SERVER_ERROR);
                }
            }
        }

        if let Err(e) = ctx.finish() {
            tracing::warn!(
                request_id = %ctx.request().id(),
                error = %e,
                "Failed to deliver response"
            );
        }

        let request = ctx.request();
        let status = ctx.status();
        let elapsed = started.elapsed();
        tracing::info!(
            request_id = %request.id(),
            client = %request.client(),
            method = %request.method(),
            path = %request.path(),
            query = request.query().unwrap_or(""),
            status = status.as_u16(),
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            generation = generation.id(),
            "Request completed"
        );
        metrics::record_request(request.method().as_str(), status.as_u16(), elapsed);
    }
}

async fn run_pipeline(generation: &Generation, ctx: &mut RequestContext) -> Result<(), RequestError> {
    for unit in generation.middleware() {
        let proceed = unit.instance.process_request(ctx).await?;
        if !proceed || ctx.is_finished() {
            tracing::debug!(
                request_id = %ctx.request().id(),
                middleware = %unit.name,
                status = ctx.status().as_u16(),
                "Middleware ended the request"
            );
            return Ok(());
        }
    }

    let route = generation
        .router()
        .matches(ctx.request().path(), ctx.request().method());

    let Some(route) = route else {
        tracing::debug!(
            request_id = %ctx.request().id(),
            path = %ctx.request().path(),
            "No route matched"
        );
        ctx.respond(StatusCode::NOT_FOUND);
        return Ok(());
    };

    tracing::trace!(
        request_id = %ctx.request().id(),
        route = %route.pattern,
        handler = %route.handler_name,
        "Route matched"
    );
    let (request, response) = ctx.parts_mut();
    route.handler.handle_request(request, response).await
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
