//! Connection acceptor.
//!
//! # Responsibilities
//! - Accept client connections until shutdown is signalled
//! - Spawn one relay session task per connection
//! - Keep per-session failures away from the accept loop
//!
//! # Design Decisions
//! - The connection-limit permit and tracker guard move into the session task
//!   and are released when it ends, however it ends
//! - Transient accept errors are logged and the loop continues

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpStream;
use tokio::sync::broadcast;

use crate::config::RelayConfig;
use crate::net::listener::ConnectionPermit;
use crate::net::{ConnectionTracker, Listener, ListenerError, TargetError};
use crate::observability::{metrics, TrafficSink};
use crate::relay::session::{RelayContext, RelaySession};

/// Accepts clients and relays each to the target.
#[derive(Debug, Clone)]
pub struct RelayServer {
    ctx: Arc<RelayContext>,
    tracker: ConnectionTracker,
}

impl RelayServer {
    pub fn new(config: &RelayConfig, sink: Arc<dyn TrafficSink>) -> Result<Self, TargetError> {
        Ok(Self::from_context(RelayContext::from_config(config, sink)?))
    }

    pub fn from_context(ctx: RelayContext) -> Self {
        Self {
            ctx: Arc::new(ctx),
            tracker: ConnectionTracker::new(),
        }
    }

    /// Live-session tracker, for draining on shutdown.
    pub fn tracker(&self) -> ConnectionTracker {
        self.tracker.clone()
    }

    /// Run the accept loop until `shutdown` fires.
    ///
    /// Returns once accepting has stopped; sessions already running continue.
    pub async fn run(&self, listener: Listener, mut shutdown: broadcast::Receiver<()>) -> Result<(), ListenerError> {
        let local = listener.local_addr().ok();
        tracing::info!(
            local = ?local,
            target = %self.ctx.connector.address(),
            tls = self.ctx.connector.is_tls(),
            max_connections = listener.max_connections(),
            "Relay accepting connections"
        );

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => self.spawn_session(stream, peer, permit),
                    Err(ListenerError::Accept(e)) => {
                        tracing::warn!(error = %e, "Accept failed");
                        metrics::record_error("accept");
                    }
                    Err(e) => return Err(e),
                },
                _ = shutdown.recv() => {
                    tracing::info!(active = self.tracker.active_count(), "Shutdown signalled, no longer accepting");
                    break;
                }
            }
        }
        Ok(())
    }

    fn spawn_session(&self, stream: TcpStream, peer: SocketAddr, permit: ConnectionPermit) {
        let guard = self.tracker.track();
        let ctx = Arc::clone(&self.ctx);
        metrics::record_session_opened();

        tokio::spawn(async move {
            let _permit = permit;
            let id = guard.id();
            tracing::debug!(connection_id = %id, peer = %peer, "Client connected");

            let mut session = RelaySession::new(id, stream, ctx);
            match session.run().await {
                Ok(summary) => {
                    tracing::debug!(
                        connection_id = %id,
                        exchanges = summary.exchanges,
                        bytes_to_target = summary.bytes_to_target,
                        bytes_to_client = summary.bytes_to_client,
                        "Session finished"
                    );
                    metrics::record_session_closed("ok");
                }
                Err(e) if e.is_graceful() => {
                    tracing::debug!(connection_id = %id, reason = %e, "Session ended");
                    metrics::record_session_closed("ok");
                }
                Err(e) => {
                    tracing::warn!(
                        connection_id = %id,
                        peer = %peer,
                        last_request = session.last_request().unwrap_or(""),
                        error = %e,
                        "Session failed"
                    );
                    metrics::record_error(e.kind());
                    metrics::record_session_closed("error");
                }
            }
            drop(guard);
        });
    }
}
