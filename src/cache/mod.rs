//! Static file cache.
//!
//! # Data Flow
//! ```text
//! StaticFilesHandler
//!     → file_cache.rs get(path) → hit: bytes
//!                               → miss: read disk → put_fresh(ticket, path, bytes)
//!
//! Filesystem change under the web root
//!     → watcher.rs (notify event → FsEvent)
//!     → file_cache.rs handle_event → invalidate affected paths
//! ```
//!
//! # Design Decisions
//! - Keys are canonical absolute paths
//! - Sliding expiry, evaluated lazily on access plus a periodic sweep
//! - A read that raced an invalidation is never stored

pub mod file_cache;
pub mod watcher;

pub use file_cache::FileCache;
pub use watcher::{FileWatcher, FsEvent};
