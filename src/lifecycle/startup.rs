//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order from a validated config
//! - Bind the listener and run the relay until shutdown
//! - Drain in-flight sessions within the configured deadline
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Logging is initialized by the caller, before the config is even loaded
//! - The listener binds last (traffic only when ready)

use std::net::SocketAddr;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::config::RelayConfig;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::spawn_signal_listener;
use crate::net::{Listener, ListenerError, TargetError};
use crate::observability::{build_sink, metrics};
use crate::relay::RelayServer;
use crate::resilience::Timeouts;

/// Fatal errors before or while serving.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("invalid metrics address {0:?}")]
    MetricsAddress(String),
    #[error("metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
    #[error("target setup: {0}")]
    Target(#[from] TargetError),
    #[error("listener: {0}")]
    Listener(#[from] ListenerError),
}

/// Run the relay described by `config` until a termination signal.
pub async fn run(config: RelayConfig) -> Result<(), StartupError> {
    if let Some(address) = &config.observability.metrics_address {
        let addr: SocketAddr = address
            .parse()
            .map_err(|_| StartupError::MetricsAddress(address.clone()))?;
        metrics::init_metrics(addr)?;
    }

    let sink = build_sink(&config.observability);
    let server = RelayServer::new(&config, sink)?;
    let listener = Listener::bind(&config.listener).await?;

    let shutdown = Shutdown::new();
    let stop = shutdown.subscribe();
    let signals = spawn_signal_listener(shutdown.clone());

    let timeouts = Timeouts::from(&config.timeouts);
    let outcome = serve(&server, listener, stop, timeouts.drain).await;
    signals.abort();
    outcome?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Accept until `stop` fires, then wait up to `drain` for sessions to end.
///
/// Returns the number of sessions abandoned at the deadline.
pub async fn serve(
    server: &RelayServer,
    listener: Listener,
    stop: broadcast::Receiver<()>,
    drain: Duration,
) -> Result<u64, ListenerError> {
    server.run(listener, stop).await?;

    let tracker = server.tracker();
    tracing::info!(active = tracker.active_count(), deadline = ?drain, "Draining sessions");
    let remaining = tracker.drain(drain).await;
    if remaining > 0 {
        tracing::warn!(remaining, "Drain deadline reached, abandoning sessions");
    }
    Ok(remaining)
}
