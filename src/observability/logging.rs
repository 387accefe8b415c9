//! Structured logging.
//!
//! # Responsibilities
//! - Initialize logging subsystem
//! - Pick the log level from config, the trace flag, or `RUST_LOG`
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - `RUST_LOG` wins over configuration when set
//! - Logs go to stderr while the text dump owns stdout

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{DumpMode, LogFormat, ObservabilityConfig};

/// Filter directive used when `RUST_LOG` is not set.
pub fn default_directive(config: &ObservabilityConfig) -> String {
    let level = if config.trace { "trace" } else { config.log_level.as_str() };
    format!("relay_proxy={level}")
}

/// Install the global subscriber.
pub fn init_logging(config: &ObservabilityConfig) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_directive(config).into());
    let registry = tracing_subscriber::registry().with(filter);

    match (config.log_format, logs_to_stderr(config)) {
        (LogFormat::Pretty, false) => registry.with(fmt::layer()).try_init(),
        (LogFormat::Pretty, true) => registry.with(fmt::layer().with_writer(std::io::stderr)).try_init(),
        (LogFormat::Json, false) => registry.with(fmt::layer().json()).try_init(),
        (LogFormat::Json, true) => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
    }
}

/// Whether log lines must stay off stdout.
pub fn logs_to_stderr(config: &ObservabilityConfig) -> bool {
    config.dump == DumpMode::Text
}
