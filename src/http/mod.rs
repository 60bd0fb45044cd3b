//! HTTP request/response model and the server front door.
//!
//! # Data Flow
//! ```text
//! Listener
//!     → request.rs (Request with ID, path, query, buffered body)
//!     → context.rs (RequestContext: request + response + one-shot sink)
//!     → server.rs (accept loop → RequestQueue → WorkerPool)
//!     → response.rs (finalise: compression.rs encoder, Content-Length)
//!     → Listener delivers to client
//! ```

pub mod compression;
pub mod context;
pub mod error;
pub mod request;
pub mod response;
pub mod server;

pub use context::RequestContext;
pub use error::{RequestError, TransportError};
pub use request::{Request, RequestId, X_REQUEST_ID};
pub use response::Response;
pub use server::{HttpServer, ServerError};
