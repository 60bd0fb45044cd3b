//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path, method)
//!     → router.rs (scan routes in specificity order)
//!     → matcher.rs (path pattern + method set)
//!     → Return: matched RouteEntry or None (404)
//!
//! Route Compilation (per configuration generation):
//!     RouteConfig[]
//!     → resolve handler via the plugin registry
//!     → PathPattern + MethodSet
//!     → Sort by specificity
//!     → Freeze as immutable Router
//! ```
//!
//! # Design Decisions
//! - Routes compiled per generation, immutable at runtime
//! - No regex in hot path (exact and prefix matching only)
//! - Deterministic: same input always matches same route
//! - First match wins (ordered by specificity)

pub mod matcher;
pub mod router;

pub use matcher::{MethodSet, PathPattern};
pub use router::{RouteEntry, Router};
