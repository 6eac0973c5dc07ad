//! Loading configuration from files and the environment.

use crate::config::{BackendKind, GatewayConfig, SECRET_TOKEN_ENV};
use crate::error::ConfigError;
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML (`.yaml`, `.yml`)
    Yaml,
    /// TOML (`.toml`)
    Toml,
}

impl ConfigFormat {
    /// Detect the format from a file extension
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Ok(Self::Yaml),
            Some("toml") => Ok(Self::Toml),
            _ => Err(ConfigError::Parse(format!(
                "unsupported config file extension: {}",
                path.display()
            ))),
        }
    }
}

/// Load configuration for the running process.
///
/// Reads `path` when given, then applies process environment overrides and
/// validates the result.
pub async fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let base = match path {
        Some(path) => Some(read_config_file(path).await?),
        None => None,
    };
    build_config(base, |key| std::env::var(key).ok())
}

async fn read_config_file(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let format = ConfigFormat::from_path(path)?;
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    debug!(path = %path.display(), ?format, "Read configuration file");
    parse_config_str(&contents, format)
}

/// Parse configuration file contents
pub fn parse_config_str(contents: &str, format: ConfigFormat) -> Result<GatewayConfig, ConfigError> {
    match format {
        ConfigFormat::Yaml => {
            serde_yaml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
        }
        ConfigFormat::Toml => toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string())),
    }
}

/// Apply environment overrides from `lookup` on top of `base` and validate.
///
/// `lookup` abstracts the environment so callers can supply any key source.
pub fn build_config<F>(base: Option<GatewayConfig>, lookup: F) -> Result<GatewayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = base.unwrap_or_default();
    apply_env(&mut config, &lookup)?;
    config.validate()?;
    Ok(config)
}

fn apply_env<F>(config: &mut GatewayConfig, lookup: &F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = lookup("GATEWAY_HOST") {
        config.server.host = host;
    }
    if let Some(port) = parse_var::<u16, _>(lookup, "GATEWAY_PORT")? {
        config.server.port = port;
    }

    if let Some(max) = parse_var::<usize, _>(lookup, "MAX_INPUT_LENGTH")? {
        config.limits.max_input_length = max;
    }
    if let Some(max) = parse_var::<usize, _>(lookup, "MAX_OUTPUT_TOKENS")? {
        config.limits.max_output_tokens = max;
    }
    if let Some(secs) = parse_var::<f64, _>(lookup, "REQUEST_TIMEOUT_SECONDS")? {
        config.limits.request_timeout =
            Duration::try_from_secs_f64(secs).map_err(|e| ConfigError::InvalidValue {
                key: "REQUEST_TIMEOUT_SECONDS".to_string(),
                message: e.to_string(),
            })?;
    }

    if let Some(secret) = lookup(SECRET_TOKEN_ENV) {
        config.auth.secret_token = Some(SecretString::new(secret));
    }
    if let Some(user_id) = lookup("AUTH_USER_ID") {
        config.auth.user_id = user_id;
    }
    if let Some(tenant_id) = lookup("AUTH_TENANT_ID") {
        config.auth.tenant_id = tenant_id;
    }

    if let Some(kind) = lookup("MODEL_BACKEND") {
        config.backend.kind = BackendKind::from_str(&kind)?;
    }
    if let Some(model) = lookup("MODEL_NAME") {
        config.backend.model = model;
    }
    if let Some(url) = lookup("OLLAMA_BASE_URL") {
        config.backend.base_url = url;
    }

    if let Some(enabled) = parse_bool(lookup, "TELEMETRY_LOCAL_LOG")? {
        config.telemetry.local_log = enabled;
    }
    if let Some(file) = lookup("TELEMETRY_LOG_FILE") {
        config.telemetry.log_file = PathBuf::from(file);
    }

    if let Some(level) = lookup("LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(format) = lookup("LOG_FORMAT") {
        config.logging.json = format.eq_ignore_ascii_case("json");
    }

    Ok(())
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })
        })
        .transpose()
}

fn parse_bool<F>(lookup: &F, key: &str) -> Result<Option<bool>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" | "" => Ok(false),
            other => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("expected a boolean, got '{other}'"),
            }),
        })
        .transpose()
}
