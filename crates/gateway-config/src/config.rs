//! Configuration types.

use crate::error::ConfigError;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use validator::{Validate, ValidationError};

/// Environment variable holding the shared bearer secret
pub const SECRET_TOKEN_ENV: &str = "GATEWAY_SECRET_TOKEN";

/// Root gateway configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener settings
    pub server: HttpConfig,
    /// Per-request safety limits
    pub limits: LimitsConfig,
    /// Credential settings
    pub auth: AuthConfig,
    /// Model backend selection
    pub backend: BackendConfig,
    /// Request telemetry output
    pub telemetry: TelemetryConfig,
    /// Diagnostic logging
    pub logging: LoggingSettings,
}

impl GatewayConfig {
    /// Validate the complete configuration
    ///
    /// # Errors
    /// Returns the first problem found: missing secret or out-of-range limits.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.auth.secret_token {
            Some(secret) if !secret.expose_secret().is_empty() => {}
            _ => return Err(ConfigError::MissingSecret(SECRET_TOKEN_ENV.to_string())),
        }

        self.limits
            .validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;

        if self.server.host.is_empty() {
            return Err(ConfigError::Validation("server.host must not be empty".to_string()));
        }

        Ok(())
    }
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address
    pub host: String,
    /// Bind port
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// Safety limits applied to every request
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Validate)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum accepted message length, in characters
    #[validate(range(min = 1))]
    pub max_input_length: usize,
    /// Output tokens allowed before truncation
    #[validate(range(min = 1))]
    pub max_output_tokens: usize,
    /// Wall-clock budget per request
    #[serde(with = "humantime_serde")]
    #[validate(custom(function = "validate_timeout"))]
    pub request_timeout: Duration,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_input_length: 2000,
            max_output_tokens: 150,
            request_timeout: Duration::from_secs(60),
        }
    }
}

fn validate_timeout(timeout: &Duration) -> Result<(), ValidationError> {
    if timeout.is_zero() {
        return Err(ValidationError::new("request_timeout_must_be_positive"));
    }
    Ok(())
}

/// Credential configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared bearer secret; required
    pub secret_token: Option<SecretString>,
    /// User id reported for callers presenting the secret
    pub user_id: String,
    /// Tenant id reported for callers presenting the secret
    pub tenant_id: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_token: None,
            user_id: "demo-user".to_string(),
            tenant_id: "demo-tenant".to_string(),
        }
    }
}

/// Supported model backends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Ollama chat API
    #[default]
    Ollama,
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::UnsupportedBackend(other.to_string())),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ollama => write!(f, "ollama"),
        }
    }
}

/// Model backend configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Which provider to use
    pub kind: BackendKind,
    /// Model name passed to the provider
    pub model: String,
    /// Provider base URL
    pub base_url: String,
    /// TCP connect timeout towards the provider
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Ollama,
            model: "llama3.2".to_string(),
            base_url: "http://localhost:11434".to_string(),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Request telemetry configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Also append records to `log_file`
    pub local_log: bool,
    /// Newline-delimited JSON telemetry file
    pub log_file: PathBuf,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            local_log: false,
            log_file: PathBuf::from("logs/chat_api.log"),
        }
    }
}

/// Diagnostic logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
