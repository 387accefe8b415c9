//! Traffic sink interface.
//!
//! A session reports every message it relays exactly once, after bodies are
//! de-chunked, inflated and rewritten and before they are re-encoded for the
//! wire. What a sink does with the record (truncation, charset handling,
//! eliding binary bodies) is entirely its own business.

use std::fmt;
use std::sync::Arc;

use crate::config::{DumpMode, ObservabilityConfig};
use crate::http::{Header, HttpMessage};
use crate::net::ConnectionId;
use crate::observability::dump::DumpSink;

/// Which leg of an exchange a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Leg {
    /// Request forwarded to the target.
    Sent,
    /// Response received from the target.
    Received,
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Leg::Sent => f.write_str(">>> SENT"),
            Leg::Received => f.write_str("<<< RECEIVED"),
        }
    }
}

/// One relayed message, borrowed from the session.
#[derive(Debug, Clone, Copy)]
pub struct TrafficRecord<'a> {
    pub connection: ConnectionId,
    pub leg: Leg,
    pub start_line: &'a [Vec<u8>],
    pub headers: &'a [Header],
    pub body: &'a [u8],
    pub content_type: Option<&'a str>,
    pub content_encoding: Option<&'a str>,
    /// Length declared on the wire, before any transcoding.
    pub content_length: usize,
    /// Start-line of the request a response answers.
    pub request_line: Option<&'a str>,
}

impl<'a> TrafficRecord<'a> {
    pub fn from_message(
        connection: ConnectionId,
        leg: Leg,
        message: &'a HttpMessage,
        request_line: Option<&'a str>,
    ) -> Self {
        Self {
            connection,
            leg,
            start_line: &message.start_line,
            headers: &message.headers,
            body: &message.body,
            content_type: message.meta.content_type.as_deref(),
            content_encoding: message.meta.content_encoding.as_deref(),
            content_length: message.meta.content_length,
            request_line,
        }
    }

    pub fn start_line_str(&self) -> String {
        String::from_utf8_lossy(&self.start_line.join(&b' ')).into_owned()
    }
}

/// Receives relayed traffic. Shared by every session.
pub trait TrafficSink: Send + Sync {
    fn record(&self, record: &TrafficRecord<'_>);
}

/// Emits one structured tracing event per message.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TrafficSink for TracingSink {
    fn record(&self, record: &TrafficRecord<'_>) {
        tracing::info!(
            target: "relay_proxy::traffic",
            connection_id = %record.connection,
            leg = ?record.leg,
            start_line = %record.start_line_str(),
            request_line = record.request_line.unwrap_or(""),
            headers = record.headers.len(),
            body_len = record.body.len(),
            content_type = record.content_type.unwrap_or(""),
            content_length = record.content_length,
            "Traffic"
        );
    }
}

/// Drops every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl TrafficSink for NullSink {
    fn record(&self, _record: &TrafficRecord<'_>) {}
}

/// Sink selected by configuration.
pub fn build_sink(config: &ObservabilityConfig) -> Arc<dyn TrafficSink> {
    match config.dump {
        DumpMode::Text => Arc::new(DumpSink::stdout(config.dump_max_body, config.dump_wrap_width)),
        DumpMode::Log => Arc::new(TracingSink),
        DumpMode::Off => Arc::new(NullSink),
    }
}
