//! Lexical address rewriting.
//!
//! # Responsibilities
//! - Swap the advertised local `host:port` and the target `host:port`
//! - Swap `http://local` and `https://target` when TLS is terminated upstream
//!
//! # Design Decisions
//! - Rewriting is byte-level substring substitution, never URL parsing
//! - A host match preceded by `.` is left alone so a longer domain ending in
//!   the address survives; this is a heuristic, not a hostname boundary check
//! - Header names, header values and body are rewritten; the start-line is not

use std::borrow::Cow;
use std::fmt;

use memchr::memmem;

use crate::http::message::HttpMessage;

/// Address exactly as it appears on the wire, e.g. `localhost:8880`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct EndpointAddress(Vec<u8>);

impl EndpointAddress {
    pub fn new(address: impl Into<Vec<u8>>) -> Self {
        Self(address.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Host part (everything before the last `:` when a port follows).
    pub fn host(&self) -> &[u8] {
        match self.split_port() {
            Some((host, _)) => host,
            None => &self.0,
        }
    }

    /// Explicit port, if the address carries one.
    pub fn port(&self) -> Option<u16> {
        self.split_port()
            .and_then(|(_, port)| std::str::from_utf8(port).ok())
            .and_then(|port| port.parse().ok())
    }

    fn split_port(&self) -> Option<(&[u8], &[u8])> {
        let colon = memchr::memrchr(b':', &self.0)?;
        let (host, port) = (&self.0[..colon], &self.0[colon + 1..]);
        // Bare IPv6 literals contain colons but no port.
        if port.is_empty() || !port.iter().all(u8::is_ascii_digit) || host.ends_with(b":") {
            return None;
        }
        Some((host, port))
    }
}

impl fmt::Display for EndpointAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Debug for EndpointAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EndpointAddress({self})")
    }
}

impl From<&str> for EndpointAddress {
    fn from(value: &str) -> Self {
        Self::new(value.as_bytes())
    }
}

/// Which way a message is travelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ClientToTarget,
    TargetToClient,
}

/// Replace every occurrence of `from` not immediately preceded by `.`.
pub fn replace_host<'a>(haystack: &'a [u8], from: &[u8], to: &[u8]) -> Cow<'a, [u8]> {
    replace_where(haystack, from, to, |start| start > 0 && haystack[start - 1] == b'.')
}

/// Replace every occurrence of `from`.
pub fn replace_all<'a>(haystack: &'a [u8], from: &[u8], to: &[u8]) -> Cow<'a, [u8]> {
    replace_where(haystack, from, to, |_| false)
}

fn replace_where<'a>(
    haystack: &'a [u8],
    from: &[u8],
    to: &[u8],
    skip: impl Fn(usize) -> bool,
) -> Cow<'a, [u8]> {
    if from.is_empty() {
        return Cow::Borrowed(haystack);
    }
    let finder = memmem::Finder::new(from);
    let mut out: Option<Vec<u8>> = None;
    let mut copied = 0;
    let mut pos = 0;

    while let Some(offset) = finder.find(&haystack[pos..]) {
        let start = pos + offset;
        if skip(start) {
            pos = start + 1;
            continue;
        }
        let buf = out.get_or_insert_with(|| Vec::with_capacity(haystack.len()));
        buf.extend_from_slice(&haystack[copied..start]);
        buf.extend_from_slice(to);
        copied = start + from.len();
        pos = copied;
    }

    match out {
        Some(mut buf) => {
            buf.extend_from_slice(&haystack[copied..]);
            Cow::Owned(buf)
        }
        None => Cow::Borrowed(haystack),
    }
}

fn apply(field: &mut Vec<u8>, rewrite: impl Fn(&[u8]) -> Cow<'_, [u8]>) {
    let updated = match rewrite(&field[..]) {
        Cow::Owned(updated) => Some(updated),
        Cow::Borrowed(_) => None,
    };
    if let Some(updated) = updated {
        *field = updated;
    }
}

/// Rewrites address references in messages crossing the relay.
#[derive(Debug, Clone)]
pub struct AddressRewriter {
    local: EndpointAddress,
    target: EndpointAddress,
    local_url: Vec<u8>,
    target_url: Vec<u8>,
    tls: bool,
}

impl AddressRewriter {
    /// Build a rewriter. Schema rewriting is active only when `tls` is set.
    pub fn new(local: EndpointAddress, target: EndpointAddress, tls: bool) -> Self {
        let local_url = [b"http://".as_slice(), local.as_bytes()].concat();
        let target_url = [b"https://".as_slice(), target.as_bytes()].concat();
        Self {
            local,
            target,
            local_url,
            target_url,
            tls,
        }
    }

    /// Schema references: `http://local` <-> `https://target`.
    ///
    /// No-op unless TLS is terminated toward the target.
    pub fn rewrite_schema(&self, message: &mut HttpMessage, direction: Direction) {
        if !self.tls {
            return;
        }
        let (from, to) = match direction {
            Direction::ClientToTarget => (&self.local_url, &self.target_url),
            Direction::TargetToClient => (&self.target_url, &self.local_url),
        };
        self.rewrite_fields(message, |field| replace_all(field, from, to));
    }

    /// Host references: `local` <-> `target`.
    pub fn rewrite_host(&self, message: &mut HttpMessage, direction: Direction) {
        let (from, to) = match direction {
            Direction::ClientToTarget => (self.local.as_bytes(), self.target.as_bytes()),
            Direction::TargetToClient => (self.target.as_bytes(), self.local.as_bytes()),
        };
        self.rewrite_fields(message, |field| replace_host(field, from, to));
    }

    /// Schema first, then host.
    pub fn rewrite(&self, message: &mut HttpMessage, direction: Direction) {
        self.rewrite_schema(message, direction);
        self.rewrite_host(message, direction);
    }

    fn rewrite_fields(&self, message: &mut HttpMessage, rewrite: impl Fn(&[u8]) -> Cow<'_, [u8]>) {
        for header in &mut message.headers {
            apply(&mut header.name, &rewrite);
            apply(&mut header.value, &rewrite);
        }
        if !message.body.is_empty() {
            apply(&mut message.body, &rewrite);
        }
    }
}
