//! Configuration loading from disk and from the command line / environment.

use std::fs;
use std::path::Path;

use crate::config::schema::RelayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Settings given on the command line or through `PROXY_*` variables.
///
/// Each `Some` wins over the file value.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub local_address: Option<String>,
    pub target_address: Option<String>,
    pub tls: Option<bool>,
    pub trace: Option<bool>,
    pub log_level: Option<String>,
}

impl Overrides {
    /// Overlay onto a base configuration.
    pub fn apply(self, config: &mut RelayConfig) {
        if let Some(local) = self.local_address {
            config.listener.local_address = local;
        }
        if let Some(target) = self.target_address {
            config.target.address = target;
        }
        if let Some(tls) = self.tls {
            config.target.tls = tls;
        }
        if let Some(trace) = self.trace {
            config.observability.trace = trace;
        }
        if let Some(level) = self.log_level {
            config.observability.log_level = level;
        }
    }
}

/// Parse a TOML file without validating it.
pub fn read_config(path: &Path) -> Result<RelayConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    toml::from_str(&content).map_err(ConfigError::Parse)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<RelayConfig, ConfigError> {
    let config = read_config(path)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Build the effective configuration: defaults, then the optional file, then
/// overrides; validated once at the end.
pub fn resolve_config(path: Option<&Path>, overrides: Overrides) -> Result<RelayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => read_config(path)?,
        None => RelayConfig::default(),
    };
    overrides.apply(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_file() {
        let file = write_config(
            r#"
            [listener]
            local_address = "0.0.0.0:9000"

            [target]
            address = "example.org:8443"
            tls = true
            "#,
        );
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.listener.local_address, "0.0.0.0:9000");
        assert!(config.target.tls);
    }

    #[test]
    fn overrides_win_over_file() {
        let file = write_config(
            r#"
            [target]
            address = "example.org"
            "#,
        );
        let overrides = Overrides {
            target_address: Some("other.example:81".into()),
            trace: Some(true),
            ..Overrides::default()
        };
        let config = resolve_config(Some(file.path()), overrides).unwrap();
        assert_eq!(config.target.address, "other.example:81");
        assert!(config.observability.trace);
    }

    #[test]
    fn no_file_needs_a_target() {
        let err = resolve_config(None, Overrides::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref errors) if errors == &vec![ValidationError::MissingTarget]));
        assert!(err.to_string().contains("target.address is required"));
    }

    #[test]
    fn parse_errors_are_reported() {
        let file = write_config("[target\naddress = 1");
        assert!(matches!(load_config(file.path()), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
