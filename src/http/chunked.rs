//! Chunked transfer coding.
//!
//! Decoding collapses a chunk sequence into one contiguous body; trailers are
//! dropped. Encoding always produces a single data chunk followed by the last
//! chunk, so original chunk boundaries are not preserved.

use memchr::memmem;

const CRLF: &[u8] = b"\r\n";

/// Chunk framing errors. All of them are fatal for the current exchange.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChunkError {
    #[error("invalid chunk size line {0:?}")]
    InvalidSize(String),
    #[error("chunk data not followed by CRLF")]
    MissingDelimiter,
    #[error("chunked body ended before the last chunk")]
    Truncated,
}

fn parse_size(line: &[u8]) -> Result<usize, ChunkError> {
    let invalid = || ChunkError::InvalidSize(String::from_utf8_lossy(line).into_owned());
    let digits = match memchr::memchr(b';', line) {
        Some(ext) => &line[..ext],
        None => line,
    };
    let digits = std::str::from_utf8(digits).map_err(|_| invalid())?.trim();
    if digits.is_empty() {
        return Err(invalid());
    }
    usize::from_str_radix(digits, 16).map_err(|_| invalid())
}

/// Decode a complete chunked body into raw bytes.
pub fn decode(mut input: &[u8]) -> Result<Vec<u8>, ChunkError> {
    let mut out = Vec::with_capacity(input.len());
    loop {
        let line_end = memmem::find(input, CRLF).ok_or(ChunkError::Truncated)?;
        let size = parse_size(&input[..line_end])?;
        if size == 0 {
            return Ok(out);
        }
        input = &input[line_end + 2..];

        let data_end = size.checked_add(2).ok_or(ChunkError::Truncated)?;
        if input.len() < data_end {
            return Err(ChunkError::Truncated);
        }
        if &input[size..data_end] != CRLF {
            return Err(ChunkError::MissingDelimiter);
        }
        out.extend_from_slice(&input[..size]);
        input = &input[data_end..];
    }
}

/// Encode `body` as a single chunk plus the last chunk.
pub fn encode(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 24);
    if !body.is_empty() {
        out.extend_from_slice(format!("{:x}", body.len()).as_bytes());
        out.extend_from_slice(CRLF);
        out.extend_from_slice(body);
        out.extend_from_slice(CRLF);
    }
    out.extend_from_slice(b"0\r\n\r\n");
    out
}

/// Length of the complete chunked encoding at the start of `buf`.
///
/// `Ok(None)` means more bytes are needed. Used by the framer to find where a
/// chunked body ends without decoding it.
pub fn encoded_len(buf: &[u8]) -> Result<Option<usize>, ChunkError> {
    let mut pos = 0;
    loop {
        let Some(line_len) = memmem::find(&buf[pos..], CRLF) else {
            return Ok(None);
        };
        let size = parse_size(&buf[pos..pos + line_len])?;
        pos += line_len + 2;

        if size == 0 {
            // Trailer section, terminated by an empty line.
            loop {
                let Some(trailer_len) = memmem::find(&buf[pos..], CRLF) else {
                    return Ok(None);
                };
                pos += trailer_len + 2;
                if trailer_len == 0 {
                    return Ok(Some(pos));
                }
            }
        }

        let data_end = match pos.checked_add(size).and_then(|end| end.checked_add(2)) {
            Some(end) => end,
            None => return Err(ChunkError::InvalidSize(format!("{size:x}"))),
        };
        if buf.len() < data_end {
            return Ok(None);
        }
        if &buf[data_end - 2..data_end] != CRLF {
            return Err(ChunkError::MissingDelimiter);
        }
        pos = data_end;
    }
}
