//! Prometheus metrics derived from telemetry records.

use crate::error::TelemetryError;
use crate::record::TelemetryRecord;
use crate::sink::TelemetrySink;
use gateway_core::StreamOutcome;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};
use tracing::warn;

/// Metrics configuration
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Prefix for every metric name
    pub namespace: String,
    /// Histogram buckets for request latency, in seconds
    pub latency_buckets: Vec<f64>,
    /// Histogram buckets for delivered tokens
    pub token_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            namespace: "gateway".to_string(),
            latency_buckets: vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0],
            token_buckets: vec![0.0, 1.0, 10.0, 25.0, 50.0, 100.0, 150.0, 250.0, 500.0],
        }
    }
}

/// Request metrics backed by a private registry
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    requests_total: IntCounterVec,
    request_latency: Histogram,
    output_tokens: Histogram,
}

impl Metrics {
    /// Build and register all metrics
    ///
    /// # Errors
    /// Returns error if a metric definition is invalid
    pub fn new(config: &MetricsConfig) -> Result<Self, TelemetryError> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new("chat_requests_total", "Completed chat requests by outcome")
                .namespace(config.namespace.clone()),
            &["status"],
        )?;
        let request_latency = Histogram::with_opts(
            HistogramOpts::new(
                "chat_request_latency_seconds",
                "Time from backend invocation to outcome",
            )
            .namespace(config.namespace.clone())
            .buckets(config.latency_buckets.clone()),
        )?;
        let output_tokens = Histogram::with_opts(
            HistogramOpts::new("chat_output_tokens", "Tokens delivered per request")
                .namespace(config.namespace.clone())
                .buckets(config.token_buckets.clone()),
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(request_latency.clone()))?;
        registry.register(Box::new(output_tokens.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            request_latency,
            output_tokens,
        })
    }

    /// Count of completed requests with `status`
    pub fn requests(&self, status: StreamOutcome) -> u64 {
        self.requests_total.with_label_values(&[status.as_str()]).get()
    }

    /// Render the registry in the Prometheus text format
    pub fn gather(&self) -> String {
        let mut buffer = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buffer) {
            warn!(error = %e, "Failed to encode metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl TelemetrySink for Metrics {
    fn record(&self, record: &TelemetryRecord) {
        self.requests_total
            .with_label_values(&[record.status.as_str()])
            .inc();
        self.request_latency.observe(record.latency_ms / 1000.0);
        self.output_tokens.observe(record.output_tokens as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_core::Identity;
    use std::time::Duration;

    fn record(status: StreamOutcome, tokens: usize) -> TelemetryRecord {
        TelemetryRecord::new(
            &Identity::new("u", "t"),
            3,
            tokens,
            Duration::from_millis(250),
            status,
        )
    }

    #[test]
    fn test_counts_by_status() {
        let metrics = Metrics::new(&MetricsConfig::default()).unwrap();
        metrics.record(&record(StreamOutcome::Ok, 4));
        metrics.record(&record(StreamOutcome::Ok, 2));
        metrics.record(&record(StreamOutcome::Timeout, 0));

        assert_eq!(metrics.requests(StreamOutcome::Ok), 2);
        assert_eq!(metrics.requests(StreamOutcome::Timeout), 1);
        assert_eq!(metrics.requests(StreamOutcome::BackendError), 0);
    }

    #[test]
    fn test_gather_text_format() {
        let metrics = Metrics::new(&MetricsConfig::default()).unwrap();
        metrics.record(&record(StreamOutcome::StreamError, 1));

        let text = metrics.gather();
        assert!(text.contains("gateway_chat_requests_total{status=\"error\"} 1"));
        assert!(text.contains("gateway_chat_request_latency_seconds_count 1"));
        assert!(text.contains("gateway_chat_output_tokens_sum 1"));
    }

    #[test]
    fn test_independent_registries() {
        let a = Metrics::new(&MetricsConfig::default()).unwrap();
        let b = Metrics::new(&MetricsConfig::default()).unwrap();
        a.record(&record(StreamOutcome::Ok, 1));
        assert_eq!(b.requests(StreamOutcome::Ok), 0);
    }
}
