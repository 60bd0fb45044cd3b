//! Security middleware.
//!
//! # Data Flow
//! ```text
//! Incoming request (in configured middleware order):
//!     → api_key.rs (401 on protected paths without the key)
//!     → rate_limit.rs (403 past the per-IP ceiling)
//!     → Pass to routing
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure
//! - No trust in client input

pub mod api_key;
pub mod rate_limit;

pub use api_key::ApiKeyGuard;
pub use rate_limit::RateLimiter;
