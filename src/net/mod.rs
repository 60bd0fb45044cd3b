//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! TCP / TLS connection
//!     → frontend.rs (axum, body buffering, size limit)
//!     → listener.rs (ListenerHandle::submit → ChannelListener)
//!     → accept loop in http::server → request queue
//!     ← finalised Response on a one-shot channel
//! ```
//!
//! # Design Decisions
//! - The engine only sees the `Listener` trait; transports are swappable
//! - TLS is optional and handled by the front-end

pub mod frontend;
pub mod listener;
pub mod tls;

pub use listener::{channel, ChannelListener, Listener, ListenerError, ListenerHandle};
