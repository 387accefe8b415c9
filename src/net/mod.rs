//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (session ID, live-session tracking)
//!     → Hand off to the relay session
//!
//! Outgoing target connection (one per session)
//!     → target.rs (resolve, connect under deadline)
//!     → tls.rs (optional TLS client handshake)
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Each session tracked for graceful shutdown
//! - Target connections are never pooled or shared between sessions

pub mod connection;
pub mod listener;
pub mod target;
pub mod tls;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{Listener, ListenerError};
pub use target::{TargetConnector, TargetError, TargetStream};
