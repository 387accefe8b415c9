//! Human-readable traffic dump.
//!
//! # Responsibilities
//! - Render each relayed message as a banner, headers and (when sensible) body
//! - Serialize output from concurrent sessions so dumps never interleave
//!
//! # Design Decisions
//! - Rendering happens before the lock is taken; the lock only covers the write
//! - Bodies are printed only for textual content types below a size limit
//! - Charset comes from `Content-Type`, falling back to latin-1

use std::fmt::Write as _;
use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

use chrono::Local;

use crate::observability::sink::{Leg, TrafficRecord, TrafficSink};

const BANNER_WIDTH: usize = 120;
const PRINTABLE_TYPES: [&str; 5] = ["text", "xml", "urlencod", "json", "javascript"];

/// Writes a text dump of every record to `W` under a mutex.
pub struct DumpSink<W: Write + Send = io::Stdout> {
    out: Mutex<W>,
    max_body: usize,
    wrap_width: usize,
}

impl DumpSink<io::Stdout> {
    pub fn stdout(max_body: usize, wrap_width: usize) -> Self {
        Self::new(io::stdout(), max_body, wrap_width)
    }
}

impl<W: Write + Send> DumpSink<W> {
    pub fn new(out: W, max_body: usize, wrap_width: usize) -> Self {
        Self {
            out: Mutex::new(out),
            max_body,
            wrap_width: wrap_width.max(1),
        }
    }

    /// Give back the writer.
    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    /// Render one record.
    pub fn render(&self, record: &TrafficRecord<'_>) -> String {
        let mut text = String::new();
        // Writing into a String cannot fail.
        let _ = self.render_into(&mut text, record);
        text
    }

    fn render_into(&self, text: &mut String, record: &TrafficRecord<'_>) -> std::fmt::Result {
        writeln!(text)?;
        writeln!(text, "{}", "*".repeat(BANNER_WIDTH))?;
        writeln!(
            text,
            "{:<15} {} : {}  [{}]",
            record.leg.to_string(),
            Local::now().to_rfc3339(),
            record.start_line_str(),
            record.connection
        )?;
        if let (Leg::Received, Some(request)) = (record.leg, record.request_line) {
            writeln!(text, "{:>44} Response to : {}", "", request)?;
        }
        writeln!(text)?;

        writeln!(text, "Headers:")?;
        for header in record.headers {
            writeln!(
                text,
                "\t{:>25} : {}",
                String::from_utf8_lossy(&header.name),
                String::from_utf8_lossy(&header.value)
            )?;
        }

        if record.body.is_empty() {
            return Ok(());
        }

        writeln!(text)?;
        writeln!(text, "Body:")?;
        let size = if record.content_length > 0 {
            record.content_length
        } else {
            record.body.len()
        };

        if !is_printable(record.content_type) {
            writeln!(text, "Binary body content, size = {size}")?;
        } else if record.content_length > self.max_body || record.body.len() > self.max_body {
            writeln!(text, "Large body skipped, size = {size}")?;
        } else if record.content_encoding == Some("deflate") {
            writeln!(text, "Body non printable")?;
        } else {
            let decoded = decode_body(record.body, record.content_type);
            for line in decoded.lines() {
                for piece in wrap(line, self.wrap_width) {
                    writeln!(text, "\t{piece}")?;
                }
            }
        }
        Ok(())
    }
}

impl<W: Write + Send> TrafficSink for DumpSink<W> {
    fn record(&self, record: &TrafficRecord<'_>) {
        let text = self.render(record);
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = out.write_all(text.as_bytes()).and_then(|_| out.flush()) {
            tracing::warn!(error = %e, "Traffic dump write failed");
        }
    }
}

fn is_printable(content_type: Option<&str>) -> bool {
    let Some(content_type) = content_type else {
        return false;
    };
    let lowered = content_type.to_ascii_lowercase();
    PRINTABLE_TYPES.iter().any(|kind| lowered.contains(kind))
}

/// `charset` parameter of a `Content-Type` value.
pub fn charset(content_type: Option<&str>) -> Option<String> {
    content_type?
        .split(';')
        .skip(1)
        .filter_map(|param| param.split_once('='))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("charset"))
        .map(|(_, value)| value.trim().trim_matches('"').to_ascii_lowercase())
}

fn decode_body(body: &[u8], content_type: Option<&str>) -> String {
    match charset(content_type).as_deref() {
        Some("utf-8") | Some("utf8") | Some("us-ascii") => String::from_utf8_lossy(body).into_owned(),
        // latin-1 maps every byte to the code point of the same value.
        _ => body.iter().map(|&b| char::from(b)).collect(),
    }
}

fn wrap(line: &str, width: usize) -> Vec<String> {
    if line.is_empty() {
        return vec![String::new()];
    }
    let chars: Vec<char> = line.chars().collect();
    chars.chunks(width).map(|piece| piece.iter().collect()).collect()
}
