//! # Chat Stream Gateway
//!
//! Authenticated single-turn chat over Server-Sent Events, with input and
//! output limits, a per-request deadline and structured request telemetry.
//!
//! ## Usage
//!
//! ```bash
//! # Start with defaults (the shared secret is always required)
//! GATEWAY_SECRET_TOKEN=changeme chat-stream-gateway
//!
//! # Start with a config file
//! chat-stream-gateway --config /path/to/config.yaml
//!
//! # Start with environment overrides
//! GATEWAY_PORT=9000 MODEL_NAME=mistral chat-stream-gateway
//! ```

use anyhow::Context;
use clap::Parser;
use gateway_config::{load_config, GatewayConfig};
use gateway_providers::backend_from_config;
use gateway_server::{AppState, Server, ServerConfig, StaticTokenAuthenticator};
use gateway_telemetry::{
    init_logging, JsonFileSink, LoggingConfig, Metrics, MetricsConfig, TracingSink,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// Streaming chat gateway
#[derive(Parser, Debug)]
#[command(name = "chat-stream-gateway")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (YAML or TOML)
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Bind host, overrides configuration
    #[arg(long)]
    host: Option<String>,

    /// Bind port, overrides configuration
    #[arg(short, long)]
    port: Option<u16>,
}

/// Application entry point
#[tokio::main]
async fn main() {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("Gateway failed: {e:#}");
        std::process::exit(1);
    }
}

/// Main application logic
async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = match load_config(cli.config.as_deref()).await {
        Ok(config) => config,
        Err(e) => {
            let _ = init_logging(&LoggingConfig::new());
            return Err(e).context("Failed to load configuration");
        }
    };

    init_logging(
        &LoggingConfig::new()
            .with_level(&config.logging.level)
            .with_json(config.logging.json),
    )?;

    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.server.host,
        port = config.server.port,
        max_input_length = config.limits.max_input_length,
        max_output_tokens = config.limits.max_output_tokens,
        request_timeout = ?config.limits.request_timeout,
        "Starting chat gateway"
    );

    let (state, file_sink) = build_state(&config)?;
    let server = Server::new(ServerConfig::from(&config.server), state);
    server.run().await.context("Server error")?;

    if let Some(sink) = file_sink {
        sink.flush();
    }

    Ok(())
}

/// Wire backend, authenticator, telemetry and metrics from configuration
fn build_state(config: &GatewayConfig) -> anyhow::Result<(AppState, Option<Arc<JsonFileSink>>)> {
    let backend = backend_from_config(&config.backend).context("Failed to create model backend")?;
    let authenticator = StaticTokenAuthenticator::from_config(&config.auth)?;
    let metrics = Arc::new(Metrics::new(&MetricsConfig::default())?);

    let mut builder = AppState::builder()
        .authenticator(Arc::new(authenticator))
        .backend(backend)
        .limits(config.limits.clone())
        .metrics(metrics)
        .sink(Arc::new(TracingSink));

    let mut file_sink = None;
    if config.telemetry.local_log {
        let sink = JsonFileSink::open(&config.telemetry.log_file).with_context(|| {
            format!(
                "Failed to open telemetry log {}",
                config.telemetry.log_file.display()
            )
        })?;
        info!(path = %sink.path().display(), "Writing telemetry records to file");
        let sink = Arc::new(sink);
        builder = builder.sink(sink.clone());
        file_sink = Some(sink);
    }

    Ok((builder.build()?, file_sink))
}
