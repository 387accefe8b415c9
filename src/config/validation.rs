//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports valid)
//! - Check option combinations (CA bundle only makes sense with TLS)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use crate::config::schema::RelayConfig;
use crate::http::EndpointAddress;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("target.address is required")]
    MissingTarget,
    #[error("{field} {value:?} is not a valid host[:port]: {reason}")]
    InvalidAddress {
        field: &'static str,
        value: String,
        reason: &'static str,
    },
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("target.ca_file is set but target.tls is disabled")]
    CaFileWithoutTls,
    #[error("observability.metrics_address {0:?} is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = check_address("listener.local_address", &config.listener.local_address, true) {
        errors.push(e);
    }

    if config.target.address.trim().is_empty() {
        errors.push(ValidationError::MissingTarget);
    } else if let Err(e) = check_address("target.address", &config.target.address, false) {
        errors.push(e);
    }

    if config.target.ca_file.is_some() && !config.target.tls {
        errors.push(ValidationError::CaFileWithoutTls);
    }

    if let Some(metrics) = &config.observability.metrics_address {
        if metrics.parse::<std::net::SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidMetricsAddress(metrics.clone()));
        }
    }

    let positive = [
        ("listener.max_connections", config.listener.max_connections as u64),
        ("timeouts.connect_secs", config.timeouts.connect_secs),
        ("timeouts.read_secs", config.timeouts.read_secs),
        ("timeouts.drain_secs", config.timeouts.drain_secs),
        ("observability.dump_max_body", config.observability.dump_max_body as u64),
        ("observability.dump_wrap_width", config.observability.dump_wrap_width as u64),
    ];
    errors.extend(
        positive
            .into_iter()
            .filter(|(_, value)| *value == 0)
            .map(|(field, _)| ValidationError::Zero(field)),
    );

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(field: &'static str, value: &str, allow_port_zero: bool) -> Result<(), ValidationError> {
    let invalid = |reason| ValidationError::InvalidAddress {
        field,
        value: value.to_string(),
        reason,
    };

    if value.is_empty() {
        return Err(invalid("empty"));
    }
    if value.chars().any(char::is_whitespace) {
        return Err(invalid("contains whitespace"));
    }

    let address = EndpointAddress::from(value);
    match address.port() {
        Some(0) if !allow_port_zero => Err(invalid("port 0")),
        Some(_) => {
            if address.host().is_empty() {
                Err(invalid("missing host"))
            } else {
                Ok(())
            }
        }
        None if value.contains(':') && !value.ends_with(']') => Err(invalid("bad port")),
        None => Ok(()),
    }
}
