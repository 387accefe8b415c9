//! Transparent logging relay (v1)
//!
//! Listens on a local address and relays every HTTP/1.x exchange to one
//! target, dumping the decoded traffic as it goes.
//!
//! # Architecture Overview
//!
//! ```text
//!                              ┌───────────────────────────────────────────────┐
//!                              │                    RELAY                      │
//!     Client request           │  ┌─────────┐    ┌─────────┐    ┌───────────┐  │
//!     ─────────────────────────┼─▶│   net   │───▶│  relay  │───▶│   http    │  │
//!                              │  │listener │    │ session │    │ framer +  │  │
//!                              │  └─────────┘    └────┬────┘    │ rewrite   │  │
//!                              │                      │         └───────────┘  │
//!     Client response          │                      ▼                        │
//!     ◀────────────────────────┼──────────────── net target ◀──────────────────┼──── Target
//!                              │                 (TCP / TLS)                   │     Server
//!                              │  ┌─────────────────────────────────────────┐  │
//!                              │  │ config · observability · resilience ·   │  │
//!                              │  │ lifecycle                               │  │
//!                              │  └─────────────────────────────────────────┘  │
//!                              └───────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::builder::FalseyValueParser;
use clap::{ArgAction, Parser};

use relay_proxy::config::{resolve_config, Overrides};
use relay_proxy::lifecycle;
use relay_proxy::observability::logging::init_logging;

#[derive(Parser, Debug)]
#[command(name = "relay-proxy", version)]
#[command(about = "Transparent logging HTTP relay", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = "PROXY_CONFIG")]
    config: Option<PathBuf>,

    /// Local address to listen on and advertise, host:port
    #[arg(short, long, env = "PROXY_LOCAL")]
    local: Option<String>,

    /// Target address, host[:port]
    #[arg(short, long, env = "PROXY_TARGET")]
    target: Option<String>,

    /// Speak TLS to the target; any non-false PROXY_SSL value enables it
    #[arg(long, env = "PROXY_SSL", action = ArgAction::SetTrue, value_parser = FalseyValueParser::new())]
    tls: bool,

    /// Trace-level logging of framing internals
    #[arg(long, env = "PROXY_TRACE", action = ArgAction::SetTrue, value_parser = FalseyValueParser::new())]
    trace: bool,

    /// Log level when RUST_LOG is unset
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            local_address: self.local.clone(),
            target_address: self.target.clone(),
            tls: self.tls.then_some(true),
            trace: self.trace.then_some(true),
            log_level: self.log_level.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = resolve_config(cli.config.as_deref(), cli.overrides())?;

    init_logging(&config.observability)?;

    tracing::info!("relay-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        local_address = %config.listener.local_address,
        target = %config.target.address,
        tls = config.target.tls,
        trace = config.observability.trace,
        read_timeout_secs = config.timeouts.read_secs,
        "Configuration loaded"
    );

    lifecycle::run(config).await?;
    Ok(())
}
