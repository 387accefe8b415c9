//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Target connect:
//!     → timeouts.rs (connect deadline covers TCP + TLS handshake)
//! Every socket read:
//!     → timeouts.rs (read deadline; expiry ends the session)
//! Shutdown:
//!     → timeouts.rs (drain deadline for in-flight sessions)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every blocking step has a deadline
//! - No retries: a failed exchange closes its session

pub mod timeouts;

pub use timeouts::{with_deadline, DeadlineExceeded, Timeouts};
