//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Build generation → Start workers → Start listeners
//!
//! Reload (startup.rs):
//!     New config → Build generation → Atomic swap
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Close queue → Drain workers → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listeners
//! - Ordered shutdown: stop accept, drain, close
//! - No mid-request cancellation during shutdown

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{build_generation, ServerContext};
