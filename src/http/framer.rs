//! Incremental HTTP/1.x message framing.
//!
//! # Data Flow
//! ```text
//! socket reads (0..N bytes each)
//!     → FrameParser buffer
//!     → AwaitingStartLine → AwaitingHeaders → AwaitingBody{discipline}
//!     → HttpMessage (bytes past the message stay buffered)
//! ```
//!
//! # Design Decisions
//! - Parsing is resumable at every stage; nothing assumes a whole line or
//!   header block arrives in one read
//! - Chunked bodies are kept encoded; their end is found by walking the chunk
//!   structure rather than decoding
//! - A message with neither `Content-Length` nor chunked coding has no body

use std::time::Duration;

use bytes::{Buf, BytesMut};
use memchr::memmem;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::http::chunked::{self, ChunkError};
use crate::http::message::{Header, HeaderError, HttpMessage, MessageKind, MessageMeta, TransferDiscipline};

/// Bytes requested from the socket per read.
pub const READ_CHUNK: usize = 64 * 1024;

/// Errors that end framing of the current message.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed header line {0:?}")]
    MalformedHeader(String),
    #[error(transparent)]
    Header(#[from] HeaderError),
    #[error(transparent)]
    Chunk(#[from] ChunkError),
    #[error("peer closed the connection mid-message ({buffered} bytes buffered)")]
    Truncated { buffered: usize },
}

/// Result of reading one message off a connection.
#[derive(Debug)]
pub enum ReadOutcome {
    Message(HttpMessage),
    /// The peer closed the connection between messages.
    EndOfStream,
    /// No bytes arrived within the read timeout.
    Timeout,
}

#[derive(Debug)]
enum FrameState {
    AwaitingStartLine,
    AwaitingHeaders {
        start_line: Vec<Vec<u8>>,
    },
    AwaitingBody {
        start_line: Vec<Vec<u8>>,
        headers: Vec<Header>,
        meta: MessageMeta,
    },
}

/// Pure, I/O-free framing state machine.
#[derive(Debug)]
pub struct FrameParser {
    state: FrameState,
    buf: BytesMut,
    kind: MessageKind,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser {
    pub fn new() -> Self {
        Self {
            state: FrameState::AwaitingStartLine,
            buf: BytesMut::with_capacity(READ_CHUNK),
            kind: MessageKind::Request,
        }
    }

    /// Set what the next message is expected to be.
    pub fn expect(&mut self, kind: MessageKind) {
        self.kind = kind;
    }

    /// Append freshly read bytes.
    pub fn feed(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Bytes buffered but not yet consumed by a complete message.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// True when no part of a message has been seen yet.
    pub fn is_idle(&self) -> bool {
        matches!(self.state, FrameState::AwaitingStartLine)
            && self.buf.iter().all(|b| *b == b'\r' || *b == b'\n')
    }

    /// Advance as far as the buffered bytes allow.
    ///
    /// Returns a message once one is complete; the parser is then ready for
    /// the next one.
    pub fn poll_message(&mut self) -> Result<Option<HttpMessage>, FrameError> {
        loop {
            match &mut self.state {
                FrameState::AwaitingStartLine => {
                    // Stray CRLFs between messages are ignored.
                    while self.buf.starts_with(b"\r\n") {
                        self.buf.advance(2);
                    }
                    let Some(end) = memmem::find(&self.buf, b"\r\n") else {
                        return Ok(None);
                    };
                    let line = self.buf.split_to(end + 2);
                    let start_line = line[..end]
                        .split(|b| b.is_ascii_whitespace())
                        .filter(|token| !token.is_empty())
                        .map(<[u8]>::to_vec)
                        .collect();
                    self.state = FrameState::AwaitingHeaders { start_line };
                }
                FrameState::AwaitingHeaders { start_line } => {
                    let headers = if self.buf.starts_with(b"\r\n") {
                        self.buf.advance(2);
                        Vec::new()
                    } else {
                        let Some(end) = memmem::find(&self.buf, b"\r\n\r\n") else {
                            return Ok(None);
                        };
                        let block = self.buf.split_to(end + 4);
                        parse_headers(&block[..end])?
                    };
                    let start_line = std::mem::take(start_line);
                    let meta = MessageMeta::derive(&start_line, &headers, self.kind)?;
                    tracing::trace!(
                        discipline = ?meta.discipline,
                        content_length = meta.content_length,
                        "Header block parsed"
                    );
                    self.state = FrameState::AwaitingBody {
                        start_line,
                        headers,
                        meta,
                    };
                }
                FrameState::AwaitingBody { meta, .. } => {
                    let body_len = match meta.discipline {
                        TransferDiscipline::None => 0,
                        TransferDiscipline::FixedLength(length) => {
                            if self.buf.len() < length {
                                return Ok(None);
                            }
                            length
                        }
                        TransferDiscipline::Chunked => match chunked::encoded_len(&self.buf)? {
                            Some(length) => length,
                            None => return Ok(None),
                        },
                    };
                    let body = self.buf.split_to(body_len).to_vec();
                    let FrameState::AwaitingBody {
                        start_line,
                        headers,
                        meta,
                    } = std::mem::replace(&mut self.state, FrameState::AwaitingStartLine)
                    else {
                        unreachable!("state checked above");
                    };
                    return Ok(Some(HttpMessage {
                        start_line,
                        headers,
                        body,
                        meta,
                    }));
                }
            }
        }
    }
}

fn parse_headers(block: &[u8]) -> Result<Vec<Header>, FrameError> {
    block
        .split(|b| *b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
        .filter(|line| !line.is_empty())
        .map(|line| {
            let colon = memchr::memchr(b':', line).ok_or_else(|| {
                FrameError::MalformedHeader(String::from_utf8_lossy(line).into_owned())
            })?;
            Ok(Header::new(
                line[..colon].trim_ascii(),
                line[colon + 1..].trim_ascii(),
            ))
        })
        .collect()
}

/// Reads whole messages off one connection.
///
/// One framer per connection; bytes read past the end of a message are kept
/// for the next call.
#[derive(Debug)]
pub struct MessageFramer {
    parser: FrameParser,
    read_timeout: Duration,
    trace: bool,
}

impl MessageFramer {
    pub fn new(read_timeout: Duration, trace: bool) -> Self {
        Self {
            parser: FrameParser::new(),
            read_timeout,
            trace,
        }
    }

    /// Read one complete message of the given kind.
    pub async fn read_message<R>(
        &mut self,
        reader: &mut R,
        kind: MessageKind,
    ) -> Result<ReadOutcome, FrameError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        self.parser.expect(kind);
        loop {
            if let Some(message) = self.parser.poll_message()? {
                return Ok(ReadOutcome::Message(message));
            }

            self.parser.buf.reserve(READ_CHUNK);
            let read = match tokio::time::timeout(self.read_timeout, reader.read_buf(&mut self.parser.buf)).await {
                Ok(read) => read?,
                Err(_) => return Ok(ReadOutcome::Timeout),
            };

            if read == 0 {
                if self.parser.is_idle() {
                    return Ok(ReadOutcome::EndOfStream);
                }
                return Err(FrameError::Truncated {
                    buffered: self.parser.buffered(),
                });
            }

            if self.trace {
                tracing::trace!(read, buffered = self.parser.buffered(), "Read bytes");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    const REQUEST: &[u8] = b"POST /submit HTTP/1.1\r\nHost: localhost:8880\r\nContent-Length: 11\r\n\r\nhello world";

    fn parse_all(parts: &[&[u8]]) -> Vec<HttpMessage> {
        let mut parser = FrameParser::new();
        let mut out = Vec::new();
        for part in parts {
            parser.feed(part);
            while let Some(message) = parser.poll_message().unwrap() {
                out.push(message);
            }
        }
        out
    }

    #[test]
    fn parses_fixed_length_in_one_read() {
        let messages = parse_all(&[REQUEST]);
        assert_eq!(messages.len(), 1);
        let msg = &messages[0];
        assert_eq!(msg.start_line_str(), "POST /submit HTTP/1.1");
        assert_eq!(msg.headers[0], Header::new("Host", "localhost:8880"));
        assert_eq!(msg.body, b"hello world");
        assert_eq!(msg.to_bytes(), REQUEST);
    }

    #[test]
    fn every_split_point_yields_the_same_message() {
        let whole = parse_all(&[REQUEST]).remove(0);
        for a in 0..REQUEST.len() {
            for b in a..REQUEST.len() {
                let messages = parse_all(&[&REQUEST[..a], &REQUEST[a..b], &REQUEST[b..]]);
                assert_eq!(messages, vec![whole.clone()], "split at {a}/{b}");
            }
        }
    }

    #[test]
    fn byte_by_byte_delivery() {
        let parts: Vec<&[u8]> = REQUEST.chunks(1).collect();
        let messages = parse_all(&parts);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].body, b"hello world");
    }

    #[test]
    fn bodyless_message_completes_at_header_end() {
        let messages = parse_all(&[b"GET / HTTP/1.1\r\nHost: localhost:8880\r\n\r\n"]);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].body.is_empty());
        assert_eq!(messages[0].meta.discipline, TransferDiscipline::None);
    }

    #[test]
    fn empty_header_block() {
        let messages = parse_all(&[b"GET / HTTP/1.0\r\n\r\n"]);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].headers.is_empty());
    }

    #[test]
    fn chunked_body_stays_encoded() {
        let wire = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n4\r\ntest\r\n0\r\n\r\n";
        let parts: Vec<&[u8]> = wire.chunks(3).collect();
        let mut parser = FrameParser::new();
        parser.expect(MessageKind::Response { to_head: false });
        let mut messages = Vec::new();
        for part in parts {
            parser.feed(part);
            if let Some(m) = parser.poll_message().unwrap() {
                messages.push(m);
            }
        }
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].body, b"4\r\ntest\r\n0\r\n\r\n");
        assert_eq!(chunked::decode(&messages[0].body).unwrap(), b"test");
    }

    #[test]
    fn pipelined_messages_are_separated() {
        let wire = [REQUEST, &b"\r\nGET /next HTTP/1.1\r\n\r\n"[..]].concat();
        let messages = parse_all(&[&wire]);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].body, b"hello world");
        assert_eq!(messages[1].start_line_str(), "GET /next HTTP/1.1");
    }

    #[test]
    fn header_without_colon_is_rejected() {
        let mut parser = FrameParser::new();
        parser.feed(b"GET / HTTP/1.1\r\nnonsense\r\n\r\n");
        assert!(matches!(parser.poll_message(), Err(FrameError::MalformedHeader(_))));
    }

    #[test]
    fn malformed_chunk_is_reported() {
        let mut parser = FrameParser::new();
        parser.feed(b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\nxyz\r\n");
        assert!(matches!(parser.poll_message(), Err(FrameError::Chunk(_))));
    }

    #[tokio::test]
    async fn reads_across_trickled_writes() {
        let (mut client, mut server) = tokio::io::duplex(8);
        tokio::spawn(async move {
            for byte in REQUEST.chunks(5) {
                client.write_all(byte).await.unwrap();
                tokio::task::yield_now().await;
            }
            client.shutdown().await.unwrap();
        });

        let mut framer = MessageFramer::new(Duration::from_secs(5), true);
        let ReadOutcome::Message(msg) = framer.read_message(&mut server, MessageKind::Request).await.unwrap() else {
            panic!("expected a message");
        };
        assert_eq!(msg.body, b"hello world");

        let next = framer.read_message(&mut server, MessageKind::Request).await.unwrap();
        assert!(matches!(next, ReadOutcome::EndOfStream));
    }

    #[tokio::test]
    async fn close_mid_message_is_truncation() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client.write_all(&REQUEST[..30]).await.unwrap();
        drop(client);

        let mut framer = MessageFramer::new(Duration::from_secs(5), false);
        let err = framer.read_message(&mut server, MessageKind::Request).await.unwrap_err();
        assert!(matches!(err, FrameError::Truncated { buffered } if buffered > 0));
    }

    #[tokio::test(start_paused = true)]
    async fn silent_peer_times_out() {
        let (_client, mut server) = tokio::io::duplex(64);
        let mut framer = MessageFramer::new(Duration::from_secs(60), false);
        let outcome = framer.read_message(&mut server, MessageKind::Request).await.unwrap();
        assert!(matches!(outcome, ReadOutcome::Timeout));
    }
}
