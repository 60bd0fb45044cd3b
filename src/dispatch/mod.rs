//! Request dispatch engine.
//!
//! # Data Flow
//! ```text
//! accept loop
//!     → queue.rs (bounded or unbounded buffer, backpressure)
//!     → pool.rs (N workers, dequeue → dispatch)
//!     → pipeline.rs (middleware chain → router → handler → finalise)
//!     → generation.rs (route table + middleware of the live configuration)
//! ```

pub mod generation;
pub mod pipeline;
pub mod pool;
pub mod queue;

pub use generation::{Generation, MiddlewareUnit};
pub use pipeline::Dispatcher;
pub use pool::{default_pool_size, WorkerPool};
pub use queue::{QueueError, RequestQueue};
