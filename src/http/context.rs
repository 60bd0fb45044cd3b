//! Per-request processing context.

use std::fmt;

use axum::http::StatusCode;
use tokio::sync::oneshot;

use crate::http::error::TransportError;
use crate::http::{Request, Response};

/// One request in flight: the inbound request, the response being built, and
/// the one-shot sink the finalised response is delivered through.
///
/// Owned by exactly one worker while processed. [`RequestContext::finish`] is
/// idempotent, so the response is delivered exactly once.
pub struct RequestContext {
    request: Request,
    response: Response,
    sink: Option<oneshot::Sender<Response>>,
    final_status: Option<StatusCode>,
}

impl RequestContext {
    /// Create a context and the receiver the listener awaits the response on.
    pub fn new(request: Request) -> (Self, oneshot::Receiver<Response>) {
        let (tx, rx) = oneshot::channel();
        let ctx = Self {
            request,
            response: Response::new(),
            sink: Some(tx),
            final_status: None,
        };
        (ctx, rx)
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    /// Borrow the request and the response at the same time, for handlers.
    pub fn parts_mut(&mut self) -> (&Request, &mut Response) {
        (&self.request, &mut self.response)
    }

    /// Replace the response with a bare status answer.
    pub fn respond(&mut self, status: StatusCode) {
        self.response.reset_with(status);
    }

    pub fn is_finished(&self) -> bool {
        self.sink.is_none()
    }

    /// Status that was (or will be) sent to the client.
    pub fn status(&self) -> StatusCode {
        self.final_status.unwrap_or_else(|| self.response.status())
    }

    /// Finalise the response and hand it to the listener.
    ///
    /// Calling this again after the first call does nothing.
    pub fn finish(&mut self) -> Result<(), TransportError> {
        let Some(sink) = self.sink.take() else {
            return Ok(());
        };

        let encoded = self.response.finalize();
        self.final_status = Some(self.response.status());

        let response = std::mem::take(&mut self.response);
        sink.send(response).map_err(|_| TransportError::ClientGone)?;
        encoded
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("request_id", &self.request.id())
            .field("method", self.request.method())
            .field("path", &self.request.path())
            .field("status", &self.status())
            .field("finished", &self.is_finished())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;

    fn ctx() -> (RequestContext, oneshot::Receiver<Response>) {
        RequestContext::new(Request::new("10.0.0.1:4000".parse().unwrap(), Method::GET, "/x"))
    }

    #[tokio::test]
    async fn finish_delivers_once() {
        let (mut ctx, rx) = ctx();
        ctx.response_mut().write(b"hello");
        ctx.finish().unwrap();
        assert!(ctx.is_finished());

        // Second call is a no-op.
        ctx.response_mut().set_status(StatusCode::IM_A_TEAPOT);
        ctx.finish().unwrap();
        assert_eq!(ctx.status(), StatusCode::OK);

        let response = rx.await.unwrap();
        assert_eq!(response.body(), b"hello");
        assert_eq!(response.headers()["content-length"], "5");
    }

    #[test]
    fn finish_reports_dropped_receiver() {
        let (mut ctx, rx) = ctx();
        drop(rx);
        assert!(matches!(ctx.finish(), Err(TransportError::ClientGone)));
        assert!(ctx.is_finished());
    }

    #[test]
    fn respond_sets_status_line_body() {
        let (mut ctx, _rx) = ctx();
        ctx.respond(StatusCode::UNAUTHORIZED);
        assert_eq!(ctx.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ctx.response().body(), b"401 Unauthorized");
    }
}
