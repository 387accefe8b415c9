//! Relay session errors.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::http::chunked::ChunkError;
use crate::http::framer::FrameError;
use crate::http::transcode::TranscodeError;
use crate::net::TargetError;

/// Errors that end an exchange and, with it, the session.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Peer closed the connection; a normal end of session.
    #[error("peer closed the connection")]
    ConnectionClosed,

    /// No bytes arrived within the read timeout.
    #[error("no data received within {0:?}")]
    ReadTimeout(Duration),

    /// Peer did not accept our bytes within the timeout.
    #[error("write stalled for {0:?}")]
    WriteTimeout(Duration),

    #[error("malformed chunk framing: {0}")]
    MalformedChunkFraming(#[source] ChunkError),

    #[error("gzip decompression failed: {0}")]
    DecompressionFailure(#[source] io::Error),

    #[error("gzip compression failed: {0}")]
    CompressionFailure(#[source] io::Error),

    /// Start-line or header block could not be interpreted.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    #[error("peer closed the connection mid-message ({buffered} bytes buffered)")]
    TruncatedMessage { buffered: usize },

    #[error("target address resolution failed: {0}")]
    AddressResolutionFailure(#[source] TargetError),

    #[error("target connection failed: {0}")]
    TargetConnectFailure(#[source] TargetError),

    #[error("TLS handshake with target failed: {0}")]
    TlsHandshake(#[source] TargetError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl RelayError {
    /// Errors that end a session without anything having gone wrong.
    pub fn is_graceful(&self) -> bool {
        matches!(self, RelayError::ConnectionClosed | RelayError::ReadTimeout(_))
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::ConnectionClosed => "connection_closed",
            RelayError::ReadTimeout(_) => "read_timeout",
            RelayError::WriteTimeout(_) => "write_timeout",
            RelayError::MalformedChunkFraming(_) => "malformed_chunk_framing",
            RelayError::DecompressionFailure(_) => "decompression_failure",
            RelayError::CompressionFailure(_) => "compression_failure",
            RelayError::MalformedMessage(_) => "malformed_message",
            RelayError::TruncatedMessage { .. } => "truncated_message",
            RelayError::AddressResolutionFailure(_) => "address_resolution_failure",
            RelayError::TargetConnectFailure(_) => "target_connect_failure",
            RelayError::TlsHandshake(_) => "tls_handshake",
            RelayError::Io(_) => "io",
        }
    }
}

impl From<FrameError> for RelayError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Io(e) => RelayError::Io(e),
            FrameError::Chunk(e) => RelayError::MalformedChunkFraming(e),
            FrameError::Truncated { buffered } => RelayError::TruncatedMessage { buffered },
            e @ (FrameError::MalformedHeader(_) | FrameError::Header(_)) => {
                RelayError::MalformedMessage(e.to_string())
            }
        }
    }
}

impl From<TranscodeError> for RelayError {
    fn from(err: TranscodeError) -> Self {
        match err {
            TranscodeError::Chunk(e) => RelayError::MalformedChunkFraming(e),
            TranscodeError::Decompress(e) => RelayError::DecompressionFailure(e),
            TranscodeError::Compress(e) => RelayError::CompressionFailure(e),
        }
    }
}

impl From<TargetError> for RelayError {
    fn from(err: TargetError) -> Self {
        match err {
            TargetError::Resolve { .. } | TargetError::NoAddresses { .. } => {
                RelayError::AddressResolutionFailure(err)
            }
            TargetError::Handshake { .. } | TargetError::ServerName(_) => RelayError::TlsHandshake(err),
            _ => RelayError::TargetConnectFailure(err),
        }
    }
}
