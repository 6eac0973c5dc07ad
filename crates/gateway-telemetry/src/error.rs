//! Telemetry errors.

/// Errors raised while setting up telemetry
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Logging subscriber could not be installed
    #[error("Failed to initialize logging: {0}")]
    Init(String),

    /// Telemetry file could not be opened
    #[error("Failed to open telemetry log: {0}")]
    Io(#[from] std::io::Error),

    /// Metric registration failed
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}
