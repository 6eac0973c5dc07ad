//! Per-request streaming pipeline.
//!
//! A request moves through `invoking -> streaming -> terminal`. Invocation
//! runs inline so its failure can still become an HTTP status. Streaming
//! runs in a spawned producer task that feeds a bounded channel; the HTTP
//! body reads from the other end.
//!
//! The [`TimeoutGuard`] is raced against the backend call and against every
//! pull from the token stream, so a backend that stalls on a single token
//! still times out.

use futures_util::StreamExt;
use gateway_config::LimitsConfig;
use gateway_core::{
    format_stream, limit_tokens, ChatRequest, GatewayError, Identity, ModelBackend, SseEvent,
    StreamOutcome, TokenStream,
};
use gateway_resilience::TimeoutGuard;
use gateway_telemetry::{TelemetryRecord, TelemetrySink};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn, Instrument, Span};

/// Events buffered between the producer and a slow client
pub const DEFAULT_CHANNEL_CAPACITY: usize = 32;

const CLIENT_DISCONNECTED: &str = "client disconnected";

/// Runs one chat request from backend invocation to telemetry
#[derive(Clone)]
pub struct RequestPipeline {
    backend: Arc<dyn ModelBackend>,
    limits: LimitsConfig,
    sink: Arc<dyn TelemetrySink>,
    channel_capacity: usize,
}

impl RequestPipeline {
    /// Create a pipeline
    pub fn new(
        backend: Arc<dyn ModelBackend>,
        limits: LimitsConfig,
        sink: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self {
            backend,
            limits,
            sink,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// Set the producer channel capacity
    #[must_use]
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Limits applied to each request
    pub fn limits(&self) -> &LimitsConfig {
        &self.limits
    }

    /// Invoke the backend and start streaming.
    ///
    /// `request` must already be validated. On success the returned stream
    /// yields SSE events ending with [`SseEvent::Done`]; telemetry is
    /// recorded once the producer finishes.
    ///
    /// # Errors
    /// Returns the backend invocation error, or `Timeout` when the backend
    /// did not produce a stream within the request budget. Telemetry has
    /// already been recorded in both cases.
    pub async fn start(
        &self,
        identity: Identity,
        request: &ChatRequest,
    ) -> Result<ReceiverStream<SseEvent>, GatewayError> {
        let mut recorder = Recorder::new(self.sink.clone(), identity, request.input_length());
        let guard = TimeoutGuard::start(self.limits.request_timeout);

        debug!(backend = self.backend.name(), "Invoking model backend");
        let invoked = tokio::select! {
            biased;
            () = guard.fired() => Err(GatewayError::Timeout),
            result = self.backend.invoke(&request.message) => result,
        };

        let tokens = match invoked {
            Ok(tokens) => tokens,
            Err(err) => {
                guard.cancel();
                if err == GatewayError::Timeout {
                    warn!(timeout = ?guard.duration(), "Backend invocation timed out");
                    recorder.finish_timeout();
                } else {
                    warn!(backend = self.backend.name(), error = %err, "Backend invocation failed");
                    recorder.finish(StreamOutcome::BackendError, 502, err.to_string());
                }
                return Err(err);
            }
        };

        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let producer = Producer {
            recorder,
            tx,
            guard,
            max_output_tokens: self.limits.max_output_tokens,
        };
        tokio::spawn(producer.run(tokens).instrument(Span::current()));

        Ok(ReceiverStream::new(rx))
    }
}

impl std::fmt::Debug for RequestPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestPipeline")
            .field("backend", &self.backend.name())
            .field("limits", &self.limits)
            .field("channel_capacity", &self.channel_capacity)
            .finish_non_exhaustive()
    }
}

enum Step {
    Event(Option<SseEvent>),
    TimedOut,
    Disconnected,
}

// Field order matters: the record is emitted before the channel closes.
struct Producer {
    recorder: Recorder,
    tx: mpsc::Sender<SseEvent>,
    guard: TimeoutGuard,
    max_output_tokens: usize,
}

impl Producer {
    async fn run(mut self, tokens: TokenStream) {
        let events = format_stream(limit_tokens(tokens, self.max_output_tokens));
        futures_util::pin_mut!(events);

        loop {
            // Once an outcome is set only the trailing `[DONE]` is left to send.
            let settled = self.recorder.outcome.is_some();
            let step = tokio::select! {
                biased;
                () = self.guard.fired(), if !settled => Step::TimedOut,
                () = self.tx.closed() => Step::Disconnected,
                event = events.next() => Step::Event(event),
            };

            match step {
                Step::Event(Some(event)) => {
                    let is_token = event.is_token();
                    let is_done = event == SseEvent::Done;
                    if let SseEvent::Error(message) = &event {
                        warn!(error = %message, "Token stream failed");
                        self.recorder.set(StreamOutcome::StreamError, 500, message.clone());
                    }

                    if self.tx.send(event).await.is_err() {
                        self.disconnected();
                        break;
                    }
                    if is_token {
                        self.recorder.output_tokens += 1;
                    }
                    if is_done {
                        if self.recorder.outcome.is_none() {
                            self.recorder.set(StreamOutcome::Ok, 200, "ok");
                        }
                        break;
                    }
                }
                Step::Event(None) => {
                    if self.recorder.outcome.is_none() {
                        self.recorder.set(StreamOutcome::Ok, 200, "ok");
                    }
                    break;
                }
                Step::TimedOut => {
                    warn!(
                        timeout = ?self.guard.duration(),
                        output_tokens = self.recorder.output_tokens,
                        "Request timed out while streaming"
                    );
                    self.recorder.finish_timeout();
                    if self.tx.send(SseEvent::timed_out()).await.is_ok() {
                        let _ = self.tx.send(SseEvent::Done).await;
                    }
                    break;
                }
                Step::Disconnected => {
                    self.disconnected();
                    break;
                }
            }
        }

        self.guard.cancel();
    }

    fn disconnected(&mut self) {
        debug!(output_tokens = self.recorder.output_tokens, "Client disconnected mid-stream");
        self.recorder
            .set(StreamOutcome::StreamError, 500, CLIENT_DISCONNECTED);
    }
}

/// Emits exactly one telemetry record, when dropped.
///
/// Dropping without a recorded outcome (the producer task panicked or was
/// aborted) reports a stream error.
struct Recorder {
    sink: Arc<dyn TelemetrySink>,
    identity: Identity,
    input_length: usize,
    started: Instant,
    output_tokens: usize,
    outcome: Option<(StreamOutcome, u16, String)>,
}

impl Recorder {
    fn new(sink: Arc<dyn TelemetrySink>, identity: Identity, input_length: usize) -> Self {
        Self {
            sink,
            identity,
            input_length,
            started: Instant::now(),
            output_tokens: 0,
            outcome: None,
        }
    }

    fn set(&mut self, outcome: StreamOutcome, status: u16, message: impl Into<String>) {
        self.outcome = Some((outcome, status, message.into()));
    }

    fn finish(mut self, outcome: StreamOutcome, status: u16, message: impl Into<String>) {
        self.set(outcome, status, message);
    }

    fn finish_timeout(&mut self) {
        self.set(StreamOutcome::Timeout, 504, GatewayError::Timeout.to_string());
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        let (outcome, status, message) = self.outcome.take().unwrap_or_else(|| {
            (
                StreamOutcome::StreamError,
                500,
                "stream interrupted".to_string(),
            )
        });

        let record = TelemetryRecord::new(
            &self.identity,
            self.input_length,
            self.output_tokens,
            self.started.elapsed(),
            outcome,
        )
        .with_backend(status, message);

        info!(
            status = %outcome,
            output_tokens = record.output_tokens,
            latency_ms = record.latency_ms,
            "Request finished"
        );
        self.sink.record(&record);
    }
}
