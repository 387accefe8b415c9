//! Transparent logging HTTP/1.x relay.
//!
//! Every client connection accepted on the local address is relayed to a
//! single configured target. Messages are framed, de-chunked and inflated,
//! reported to a traffic sink, have the advertised local address rewritten to
//! the target's (and back), then re-encoded for the wire.

// Core subsystems
pub mod config;
pub mod http;
pub mod net;
pub mod relay;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::RelayConfig;
pub use lifecycle::Shutdown;
pub use relay::{RelayError, RelayServer};
