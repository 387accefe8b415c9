//! In-memory HTTP/1.x message model.
//!
//! # Responsibilities
//! - Hold start-line tokens, ordered headers and the body of one message
//! - Derive (once) the framing facts the relay needs from the header block
//! - Serialize back onto the wire in the normalized `name: value` form
//!
//! # Design Decisions
//! - Start-line is kept as raw tokens; requests and responses are not
//!   distinguished beyond what framing needs
//! - Header order is significant and preserved; values are replaced in place

use std::fmt;

/// How the end of a message body is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDiscipline {
    /// No body follows the header block.
    None,
    /// Body is exactly the declared number of bytes.
    FixedLength(usize),
    /// Body is a chunked transfer encoding.
    Chunked,
}

impl TransferDiscipline {
    /// Whether the body travels chunk-encoded.
    pub fn is_chunked(&self) -> bool {
        matches!(self, TransferDiscipline::Chunked)
    }
}

/// Which side of an exchange a message is read from.
///
/// Only responses can be bodyless by status or by answering a `HEAD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Request,
    Response { to_head: bool },
}

/// A single header line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: Vec<u8>,
    pub value: Vec<u8>,
}

impl Header {
    pub fn new(name: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// ASCII case-insensitive name comparison.
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name.as_bytes())
    }

    /// Value as lossy UTF-8, for logging and derived fields.
    pub fn value_str(&self) -> String {
        String::from_utf8_lossy(&self.value).into_owned()
    }
}

/// Errors found while interpreting a header block.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeaderError {
    #[error("invalid Content-Length value {0:?}")]
    InvalidContentLength(String),
}

/// Framing facts derived from the header block.
///
/// Computed once, when the header block is complete, and kept alongside the
/// message so later stages never re-scan headers for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageMeta {
    /// Declared `Content-Length`, 0 when absent.
    pub content_length: usize,
    /// Lowercased `Content-Encoding`.
    pub content_encoding: Option<String>,
    /// Raw `Content-Type`.
    pub content_type: Option<String>,
    pub discipline: TransferDiscipline,
}

impl MessageMeta {
    /// Derive framing facts for a freshly parsed header block.
    pub fn derive(
        start_line: &[Vec<u8>],
        headers: &[Header],
        kind: MessageKind,
    ) -> Result<Self, HeaderError> {
        let find = |name: &str| headers.iter().find(|h| h.is(name)).map(Header::value_str);

        let content_length = match find("Content-Length") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .map_err(|_| HeaderError::InvalidContentLength(raw.clone()))?,
            None => 0,
        };
        let content_encoding = find("Content-Encoding").map(|v| v.trim().to_ascii_lowercase());
        let content_type = find("Content-Type");
        let chunked = find("Transfer-Encoding")
            .map(|v| {
                v.split(',')
                    .any(|coding| coding.trim().eq_ignore_ascii_case("chunked"))
            })
            .unwrap_or(false);

        let discipline = if is_bodyless_response(start_line, kind) {
            TransferDiscipline::None
        } else if chunked {
            TransferDiscipline::Chunked
        } else if find("Content-Length").is_some() {
            TransferDiscipline::FixedLength(content_length)
        } else {
            TransferDiscipline::None
        };

        Ok(Self {
            content_length,
            content_encoding,
            content_type,
            discipline,
        })
    }

    pub fn is_gzip(&self) -> bool {
        self.content_encoding.as_deref() == Some("gzip")
    }
}

fn is_bodyless_response(start_line: &[Vec<u8>], kind: MessageKind) -> bool {
    let MessageKind::Response { to_head } = kind else {
        return false;
    };
    if to_head {
        return true;
    }
    match start_line.get(1) {
        Some(status) => {
            status.first() == Some(&b'1') || status.as_slice() == b"204" || status.as_slice() == b"304"
        }
        None => false,
    }
}

/// One complete HTTP message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpMessage {
    pub start_line: Vec<Vec<u8>>,
    pub headers: Vec<Header>,
    pub body: Vec<u8>,
    pub meta: MessageMeta,
}

impl HttpMessage {
    /// Start-line tokens joined by single spaces.
    pub fn start_line_bytes(&self) -> Vec<u8> {
        self.start_line.join(&b' ')
    }

    /// Start-line as lossy UTF-8.
    pub fn start_line_str(&self) -> String {
        String::from_utf8_lossy(&self.start_line_bytes()).into_owned()
    }

    /// Request method, if this is a request line.
    pub fn method(&self) -> Option<&[u8]> {
        self.start_line.first().map(Vec::as_slice)
    }

    /// First header value matching `name`, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&[u8]> {
        self.headers
            .iter()
            .find(|h| h.is(name))
            .map(|h| h.value.as_slice())
    }

    /// Replace the value of the first `name` header in place.
    ///
    /// Returns false, leaving the headers untouched, when no such header exists.
    pub fn replace_header(&mut self, name: &str, value: impl Into<Vec<u8>>) -> bool {
        match self.headers.iter_mut().find(|h| h.is(name)) {
            Some(header) => {
                header.value = value.into();
                true
            }
            None => false,
        }
    }

    /// Bring `Content-Length` in line with the current body.
    ///
    /// Only fixed-length messages carry a meaningful length; the header is
    /// never added when it was not already present.
    pub fn sync_content_length(&mut self) -> bool {
        let TransferDiscipline::FixedLength(declared) = self.meta.discipline else {
            return false;
        };
        let actual = self.body.len();
        if declared == actual {
            return false;
        }
        if self.replace_header("Content-Length", actual.to_string()) {
            self.meta.content_length = actual;
            self.meta.discipline = TransferDiscipline::FixedLength(actual);
            tracing::trace!(declared, actual, "Content-Length recomputed");
            true
        } else {
            false
        }
    }

    /// Serialize in wire form.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.wire_len_hint());
        out.extend_from_slice(&self.start_line_bytes());
        out.extend_from_slice(b"\r\n");
        for header in &self.headers {
            out.extend_from_slice(&header.name);
            out.extend_from_slice(b": ");
            out.extend_from_slice(&header.value);
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        out
    }

    fn wire_len_hint(&self) -> usize {
        let line: usize = self.start_line.iter().map(|t| t.len() + 1).sum();
        let headers: usize = self
            .headers
            .iter()
            .map(|h| h.name.len() + h.value.len() + 4)
            .sum();
        line + headers + 4 + self.body.len()
    }
}

impl fmt::Display for HttpMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.start_line_str())
    }
}
