//! Shared application state.

use crate::auth::Authenticator;
use crate::pipeline::RequestPipeline;
use gateway_config::LimitsConfig;
use gateway_core::{GatewayError, GatewayResult, ModelBackend};
use gateway_telemetry::{FanoutSink, Metrics, MetricsConfig, TelemetrySink, TracingSink};
use std::sync::Arc;

/// State shared by all handlers
#[derive(Clone)]
pub struct AppState {
    /// Credential check for `/chat`
    pub authenticator: Arc<dyn Authenticator>,
    /// Streaming pipeline
    pub pipeline: Arc<RequestPipeline>,
    /// Prometheus metrics
    pub metrics: Arc<Metrics>,
}

impl AppState {
    /// Start building application state
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::default()
    }

    /// Configured maximum message length
    pub fn max_input_length(&self) -> usize {
        self.pipeline.limits().max_input_length
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

/// Builder for [`AppState`]
#[derive(Default)]
pub struct AppStateBuilder {
    authenticator: Option<Arc<dyn Authenticator>>,
    backend: Option<Arc<dyn ModelBackend>>,
    limits: Option<LimitsConfig>,
    sinks: Vec<Arc<dyn TelemetrySink>>,
    metrics: Option<Arc<Metrics>>,
    channel_capacity: Option<usize>,
}

impl AppStateBuilder {
    /// Set the authenticator
    #[must_use]
    pub fn authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    /// Set the model backend
    #[must_use]
    pub fn backend(mut self, backend: Arc<dyn ModelBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set the request limits
    #[must_use]
    pub fn limits(mut self, limits: LimitsConfig) -> Self {
        self.limits = Some(limits);
        self
    }

    /// Add a telemetry sink. Without any, records go to [`TracingSink`].
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Use an existing metrics registry
    #[must_use]
    pub fn metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Set the per-request event buffer
    #[must_use]
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = Some(capacity);
        self
    }

    /// Build the state
    ///
    /// # Errors
    /// Returns error if the authenticator or backend is missing, or metrics
    /// cannot be registered
    pub fn build(self) -> GatewayResult<AppState> {
        let authenticator = self
            .authenticator
            .ok_or_else(|| GatewayError::configuration("authenticator is required"))?;
        let backend = self
            .backend
            .ok_or_else(|| GatewayError::configuration("model backend is required"))?;

        let metrics = match self.metrics {
            Some(metrics) => metrics,
            None => Arc::new(
                Metrics::new(&MetricsConfig::default())
                    .map_err(|e| GatewayError::internal(e.to_string()))?,
            ),
        };

        let mut fanout = FanoutSink::new();
        if self.sinks.is_empty() {
            fanout = fanout.with_sink(Arc::new(TracingSink));
        }
        for sink in self.sinks {
            fanout = fanout.with_sink(sink);
        }
        fanout = fanout.with_sink(metrics.clone());

        let mut pipeline =
            RequestPipeline::new(backend, self.limits.unwrap_or_default(), Arc::new(fanout));
        if let Some(capacity) = self.channel_capacity {
            pipeline = pipeline.with_channel_capacity(capacity);
        }

        Ok(AppState {
            authenticator,
            pipeline: Arc::new(pipeline),
            metrics,
        })
    }
}
