//! Relay subsystem.
//!
//! # Data Flow
//! ```text
//! server.rs (accept loop)
//!     → one task per client connection
//!     → session.rs (Connecting → Exchanging → Closed)
//!         → http framer / transcode / rewrite
//!         → TrafficSink (once per message)
//! ```
//!
//! # Design Decisions
//! - Sessions share only immutable context and the sink
//! - An error in one session never reaches the accept loop or other sessions

pub mod error;
pub mod server;
pub mod session;

pub use error::RelayError;
pub use server::RelayServer;
pub use session::{RelayContext, RelaySession, SessionState, SessionSummary};
