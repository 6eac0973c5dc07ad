//! Configuration errors.

use std::path::PathBuf;

/// Errors raised while loading or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The shared secret is absent or empty
    #[error("Environment variable {0} not set")]
    MissingSecret(String),

    /// An environment value could not be parsed
    #[error("Invalid value for {key}: {message}")]
    InvalidValue {
        /// Offending key
        key: String,
        /// Parse failure
        message: String,
    },

    /// The configured backend is not supported
    #[error("Unsupported model backend: {0}")]
    UnsupportedBackend(String),

    /// A value is out of range
    #[error("Invalid configuration: {0}")]
    Validation(String),

    /// The configuration file could not be read
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The configuration file could not be parsed
    #[error("Failed to parse config: {0}")]
    Parse(String),
}
