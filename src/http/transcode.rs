//! Body transcoding between wire form and the form the relay works on.
//!
//! # Responsibilities
//! - Collapse chunked bodies into one contiguous body
//! - Inflate `gzip` bodies so rewriting and the traffic sink see plain bytes
//! - Restore the wire form before forwarding, keeping `Content-Length` honest
//!
//! # Design Decisions
//! - Re-chunking emits a single chunk; original boundaries are discarded
//! - Other content codings pass through untouched

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::http::chunked::{self, ChunkError};
use crate::http::message::HttpMessage;

/// Errors raised while transcoding a body. Fatal for the exchange.
#[derive(Debug, thiserror::Error)]
pub enum TranscodeError {
    #[error("malformed chunk framing: {0}")]
    Chunk(#[from] ChunkError),
    #[error("gzip decompression failed: {0}")]
    Decompress(#[source] std::io::Error),
    #[error("gzip compression failed: {0}")]
    Compress(#[source] std::io::Error),
}

/// Inflate a gzip body.
pub fn decompress(body: &[u8]) -> Result<Vec<u8>, TranscodeError> {
    let mut out = Vec::with_capacity(body.len() * 2);
    GzDecoder::new(body)
        .read_to_end(&mut out)
        .map_err(TranscodeError::Decompress)?;
    Ok(out)
}

/// Deflate `raw` with gzip, wrapping it as a single chunk when the message
/// travelled chunked.
pub fn compress(raw: &[u8], was_chunked: bool) -> Result<Vec<u8>, TranscodeError> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(raw.len() / 2 + 32), Compression::default());
    encoder.write_all(raw).map_err(TranscodeError::Compress)?;
    let body = encoder.finish().map_err(TranscodeError::Compress)?;
    if was_chunked {
        Ok(chunked::encode(&body))
    } else {
        Ok(body)
    }
}

/// What [`normalize`] undid, so [`restore`] can redo it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BodyEncoding {
    pub chunked: bool,
    pub gzip: bool,
}

/// Bring the body into plain form: de-chunked and inflated.
pub fn normalize(message: &mut HttpMessage) -> Result<BodyEncoding, TranscodeError> {
    let mut encoding = BodyEncoding::default();

    if message.meta.discipline.is_chunked() {
        message.body = chunked::decode(&message.body)?;
        encoding.chunked = true;
    }

    if message.meta.is_gzip() && !message.body.is_empty() {
        message.body = decompress(&message.body)?;
        encoding.gzip = true;
        tracing::trace!(inflated = message.body.len(), "Body decompressed");
    }

    Ok(encoding)
}

/// Re-apply the wire encoding recorded by [`normalize`] and recompute
/// `Content-Length` when the body length changed.
pub fn restore(message: &mut HttpMessage, encoding: BodyEncoding) -> Result<(), TranscodeError> {
    if encoding.gzip {
        message.body = compress(&message.body, encoding.chunked)?;
    } else if encoding.chunked {
        message.body = chunked::encode(&message.body);
    }
    message.sync_content_length();
    Ok(())
}
