//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration for the relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct RelayConfig {
    /// Local listener (the address clients believe they talk to).
    pub listener: ListenerConfig,

    /// The single upstream target.
    pub target: TargetConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Logging, traffic dump and metrics settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Advertised local address, `host:port`. Bound for listening and used
    /// verbatim when rewriting traffic.
    pub local_address: String,

    /// Maximum concurrent sessions (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            local_address: "localhost:8880".to_string(),
            max_connections: 1024,
        }
    }
}

/// Upstream target configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct TargetConfig {
    /// Target address, `host[:port]`. Used verbatim when rewriting traffic;
    /// the port defaults to 80, or 443 with TLS, when connecting.
    pub address: String,

    /// Terminate TLS toward the target (speak HTTPS upstream).
    pub tls: bool,

    /// Extra PEM root certificates trusted for the target, on top of the
    /// bundled web PKI roots.
    pub ca_file: Option<PathBuf>,
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Target connection establishment (TCP + TLS) timeout in seconds.
    pub connect_secs: u64,

    /// Maximum wait for a single socket read in seconds.
    pub read_secs: u64,

    /// How long shutdown waits for in-flight sessions, in seconds.
    pub drain_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 10,
            read_secs: 60,
            drain_secs: 30,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Where relayed traffic is dumped.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DumpMode {
    /// Human-readable dump on stdout.
    #[default]
    Text,
    /// One structured tracing event per message.
    Log,
    /// No dump.
    Off,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Verbose relay tracing (per-read byte counts, framing steps).
    pub trace: bool,

    /// Traffic dump destination.
    pub dump: DumpMode,

    /// Bodies larger than this are not printed by the text dump.
    pub dump_max_body: usize,

    /// Column at which dumped body lines wrap.
    pub dump_wrap_width: usize,

    /// Prometheus exporter bind address. Disabled when unset.
    pub metrics_address: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            trace: false,
            dump: DumpMode::Text,
            dump_max_body: 40_000,
            dump_wrap_width: 120,
            metrics_address: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_toml_uses_defaults() {
        let config: RelayConfig = toml::from_str(
            r#"
            [target]
            address = "example.com"
            tls = true
            "#,
        )
        .unwrap();
        assert_eq!(config.target.address, "example.com");
        assert!(config.target.tls);
        assert_eq!(config.listener.local_address, "localhost:8880");
        assert_eq!(config.timeouts.read_secs, 60);
        assert_eq!(config.observability.dump, DumpMode::Text);
    }

    #[test]
    fn enums_are_lowercase() {
        let config: RelayConfig = toml::from_str(
            r#"
            [observability]
            log_format = "json"
            dump = "off"
            "#,
        )
        .unwrap();
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert_eq!(config.observability.dump, DumpMode::Off);
    }
}
