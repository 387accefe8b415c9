//! HTTP/1.x relay engine.
//!
//! # Data Flow
//! ```text
//! connection bytes
//!     → framer.rs (start-line, headers, body boundary)
//!     → message.rs (HttpMessage + derived framing facts)
//!     → transcode.rs (de-chunk, gunzip) using chunked.rs
//!     → rewrite.rs (schema + host substitution)
//!     → transcode.rs (gzip, re-chunk, Content-Length)
//!     → message.rs (serialize)
//! ```
//!
//! # Design Decisions
//! - No HTTP library: framing is done on raw bytes so the relay can forward
//!   exactly what it reads, modulo rewriting
//! - Everything here is per-message and free of shared state

pub mod chunked;
pub mod framer;
pub mod message;
pub mod rewrite;
pub mod transcode;

pub use framer::{FrameError, FrameParser, MessageFramer, ReadOutcome};
pub use message::{Header, HttpMessage, MessageKind, MessageMeta, TransferDiscipline};
pub use rewrite::{AddressRewriter, Direction, EndpointAddress};
