//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!
//! Relay sessions additionally produce, once per message:
//!     → sink.rs (TrafficSink trait, TrafficRecord)
//!     → dump.rs (human-readable traffic dump) or a tracing event
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging, JSON optional for machine parsing
//! - Connection ID flows through every session log line
//! - Metrics are cheap (atomic increments)
//! - The traffic dump is serialized by a lock owned by the sink, never by
//!   the sessions feeding it

pub mod dump;
pub mod logging;
pub mod metrics;
pub mod sink;

pub use dump::DumpSink;
pub use sink::{build_sink, Leg, NullSink, TracingSink, TrafficRecord, TrafficSink};
