//! # Gateway Telemetry
//!
//! Observability for the chat gateway.
//!
//! This crate provides:
//! - One structured [`TelemetryRecord`] per request, handed to a [`TelemetrySink`]
//! - Sinks for tracing output, newline-delimited JSON files and tests
//! - Prometheus metrics derived from the same records
//! - Structured logging setup

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod logging;
pub mod metrics;
pub mod record;
pub mod sink;

// Re-export main types
pub use error::TelemetryError;
pub use logging::{init_logging, LoggingConfig};
pub use metrics::{Metrics, MetricsConfig};
pub use record::TelemetryRecord;
pub use sink::{FanoutSink, InMemorySink, JsonFileSink, TelemetrySink, TracingSink};
