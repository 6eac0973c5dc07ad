//! # Gateway Config
//!
//! Configuration for the chat gateway.
//!
//! Configuration is resolved once at startup, in this order:
//! 1. Built-in defaults
//! 2. Optional YAML or TOML file
//! 3. Environment variables
//!
//! The result is validated and then shared read-only for the life of the
//! process.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod loader;

pub use config::{
    AuthConfig, BackendConfig, BackendKind, GatewayConfig, HttpConfig, LimitsConfig,
    LoggingSettings, TelemetryConfig,
};
pub use error::ConfigError;
pub use loader::{build_config, load_config, parse_config_str, ConfigFormat};
