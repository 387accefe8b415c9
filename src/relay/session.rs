//! One client connection relayed to one target connection.
//!
//! # Data Flow
//! ```text
//! Connecting: TargetConnector::connect (TCP, optional TLS)
//! Exchanging, per request:
//!     client → framer → normalize → rewrite → sink(Sent) → restore → target
//!     target → framer → normalize → sink(Received) → rewrite → restore → client
//! Closed: both streams shut down
//! ```
//!
//! # Design Decisions
//! - Strictly one request in flight; the response is read before the next
//!   request is taken off the client connection
//! - Interim `1xx` responses are forwarded and the final response awaited
//! - No retries; any error ends the session

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::config::RelayConfig;
use crate::http::{transcode, AddressRewriter, Direction, EndpointAddress, HttpMessage, MessageFramer, MessageKind, ReadOutcome};
use crate::net::{ConnectionId, TargetConnector, TargetError};
use crate::observability::{metrics, Leg, TrafficRecord, TrafficSink};
use crate::relay::error::RelayError;
use crate::resilience::{with_deadline, Timeouts};

/// Everything a session needs that is shared by all sessions.
pub struct RelayContext {
    pub rewriter: AddressRewriter,
    pub connector: TargetConnector,
    pub sink: Arc<dyn TrafficSink>,
    pub read_timeout: Duration,
    pub trace: bool,
}

impl RelayContext {
    /// Build from configuration; prepares the TLS client config once.
    pub fn from_config(config: &RelayConfig, sink: Arc<dyn TrafficSink>) -> Result<Self, TargetError> {
        let timeouts = Timeouts::from(&config.timeouts);
        let rewriter = AddressRewriter::new(
            EndpointAddress::from(config.listener.local_address.as_str()),
            EndpointAddress::from(config.target.address.as_str()),
            config.target.tls,
        );
        Ok(Self {
            rewriter,
            connector: TargetConnector::new(&config.target, timeouts.connect)?,
            sink,
            read_timeout: timeouts.read,
            trace: config.observability.trace,
        })
    }
}

impl std::fmt::Debug for RelayContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayContext")
            .field("rewriter", &self.rewriter)
            .field("connector", &self.connector)
            .field("read_timeout", &self.read_timeout)
            .field("trace", &self.trace)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Exchanging,
    Closed,
}

/// Counters for a finished session.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub exchanges: u64,
    pub bytes_to_target: u64,
    pub bytes_to_client: u64,
}

pub struct RelaySession<C> {
    id: ConnectionId,
    client: C,
    ctx: Arc<RelayContext>,
    state: SessionState,
    last_request: Option<String>,
    summary: SessionSummary,
}

impl<C> RelaySession<C>
where
    C: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(id: ConnectionId, client: C, ctx: Arc<RelayContext>) -> Self {
        Self {
            id,
            client,
            ctx,
            state: SessionState::Connecting,
            last_request: None,
            summary: SessionSummary::default(),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Start-line of the most recent request forwarded to the target.
    pub fn last_request(&self) -> Option<&str> {
        self.last_request.as_deref()
    }

    /// Connect to the target and relay until either side is done.
    pub async fn run(&mut self) -> Result<SessionSummary, RelayError> {
        self.transition(SessionState::Connecting);
        let target = match self.ctx.connector.connect().await {
            Ok(target) => target,
            Err(e) => {
                self.transition(SessionState::Closed);
                if let Err(close) = self.client.shutdown().await {
                    tracing::debug!(connection_id = %self.id, error = %close, "Client shutdown failed");
                }
                return Err(e.into());
            }
        };
        self.relay(target).await
    }

    /// Relay over an already established target stream.
    pub async fn relay<T>(&mut self, mut target: T) -> Result<SessionSummary, RelayError>
    where
        T: AsyncRead + AsyncWrite + Unpin + Send,
    {
        self.transition(SessionState::Exchanging);
        let mut client_framer = MessageFramer::new(self.ctx.read_timeout, self.ctx.trace);
        let mut target_framer = MessageFramer::new(self.ctx.read_timeout, self.ctx.trace);

        let result = loop {
            match self.exchange(&mut client_framer, &mut target_framer, &mut target).await {
                Ok(true) => continue,
                Ok(false) => break Ok(self.summary),
                Err(e) => break Err(e),
            }
        };

        self.transition(SessionState::Closed);
        if let Err(e) = target.shutdown().await {
            tracing::debug!(connection_id = %self.id, error = %e, "Target shutdown failed");
        }
        if let Err(e) = self.client.shutdown().await {
            tracing::debug!(connection_id = %self.id, error = %e, "Client shutdown failed");
        }
        result
    }

    /// One request/response pair. `Ok(false)` when the client is done.
    async fn exchange<T>(
        &mut self,
        client_framer: &mut MessageFramer,
        target_framer: &mut MessageFramer,
        target: &mut T,
    ) -> Result<bool, RelayError>
    where
        T: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let mut request = match client_framer.read_message(&mut self.client, MessageKind::Request).await? {
            ReadOutcome::Message(message) => message,
            ReadOutcome::EndOfStream => {
                tracing::debug!(connection_id = %self.id, "Client closed the connection");
                return Ok(false);
            }
            ReadOutcome::Timeout => {
                tracing::debug!(connection_id = %self.id, timeout = ?self.ctx.read_timeout, "Client idle");
                return Ok(false);
            }
        };

        let request_line = request.start_line_str();
        let to_head = request.method() == Some(b"HEAD".as_slice());
        tracing::debug!(connection_id = %self.id, request = %request_line, "Request received");

        self.forward(&mut request, Direction::ClientToTarget, None)?;
        let sent = self.write(target, &request).await?;
        self.summary.bytes_to_target += sent as u64;
        metrics::record_bytes("to_target", sent);
        self.last_request = Some(request_line);

        loop {
            let mut response = match target_framer
                .read_message(target, MessageKind::Response { to_head })
                .await?
            {
                ReadOutcome::Message(message) => message,
                ReadOutcome::EndOfStream => {
                    tracing::debug!(connection_id = %self.id, "Target closed the connection");
                    return Err(RelayError::ConnectionClosed);
                }
                ReadOutcome::Timeout => return Err(RelayError::ReadTimeout(self.ctx.read_timeout)),
            };

            let interim = is_interim(&response);
            let request_line = self.last_request.clone();
            self.forward(&mut response, Direction::TargetToClient, request_line.as_deref())?;
            let delivered = self.write_client(&response).await?;
            self.summary.bytes_to_client += delivered as u64;
            metrics::record_bytes("to_client", delivered);

            if !interim {
                break;
            }
            tracing::trace!(connection_id = %self.id, status = %response.start_line_str(), "Interim response relayed");
        }

        self.summary.exchanges += 1;
        metrics::record_exchange();
        Ok(true)
    }

    /// Normalize, rewrite, report and re-encode one message in place.
    fn forward(&self, message: &mut HttpMessage, direction: Direction, request_line: Option<&str>) -> Result<(), RelayError> {
        let encoding = transcode::normalize(message)?;
        match direction {
            Direction::ClientToTarget => {
                self.ctx.rewriter.rewrite(message, direction);
                self.report(Leg::Sent, message, None);
            }
            Direction::TargetToClient => {
                self.report(Leg::Received, message, request_line);
                self.ctx.rewriter.rewrite(message, direction);
            }
        }
        transcode::restore(message, encoding)?;
        Ok(())
    }

    fn report(&self, leg: Leg, message: &HttpMessage, request_line: Option<&str>) {
        self.ctx
            .sink
            .record(&TrafficRecord::from_message(self.id, leg, message, request_line));
    }

    async fn write_client(&mut self, message: &HttpMessage) -> Result<usize, RelayError> {
        let limit = self.ctx.read_timeout;
        write_message(&mut self.client, message, limit).await
    }

    async fn write<T>(&self, target: &mut T, message: &HttpMessage) -> Result<usize, RelayError>
    where
        T: AsyncWrite + Unpin + Send,
    {
        write_message(target, message, self.ctx.read_timeout).await
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            tracing::trace!(connection_id = %self.id, from = ?self.state, to = ?next, "Session state");
        }
        self.state = next;
    }
}

/// `1xx` other than `101 Switching Protocols`.
fn is_interim(response: &HttpMessage) -> bool {
    match response.start_line.get(1) {
        Some(status) => status.len() == 3 && status[0] == b'1' && status.as_slice() != b"101",
        None => false,
    }
}

async fn write_message<W>(writer: &mut W, message: &HttpMessage, limit: Duration) -> Result<usize, RelayError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let bytes = message.to_bytes();
    with_deadline(limit, async {
        writer.write_all(&bytes).await?;
        writer.flush().await
    })
    .await
    .map_err(|_| RelayError::WriteTimeout(limit))??;
    Ok(bytes.len())
}
