//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! optional config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → CLI flags / PROXY_* environment (Overrides)
//!     → validation.rs (semantic checks)
//!     → RelayConfig (validated, immutable)
//!     → shared with the accept loop and every session
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; a change requires a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, resolve_config, ConfigError, Overrides};
pub use schema::{DumpMode, ListenerConfig, LogFormat, ObservabilityConfig, RelayConfig, TargetConfig, TimeoutConfig};
pub use validation::{validate_config, ValidationError};
