//! Telemetry sinks.
//!
//! A sink receives one [`TelemetryRecord`] per request. Recording must never
//! fail the request: sinks log and swallow their own I/O problems.

use crate::error::TelemetryError;
use crate::record::TelemetryRecord;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{mpsc as std_mpsc, Arc};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Destination for request telemetry
pub trait TelemetrySink: Send + Sync {
    /// Record one completed request
    fn record(&self, record: &TelemetryRecord);
}

/// Emits each record as a JSON line through `tracing` (target `telemetry`)
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn record(&self, record: &TelemetryRecord) {
        info!(
            target: "telemetry",
            status = %record.status,
            user_id = %record.user_id,
            output_tokens = record.output_tokens,
            latency_ms = record.latency_ms,
            "{}",
            record.to_json_line()
        );
    }
}

/// Appends newline-delimited JSON records to a file.
///
/// `record` only enqueues the line. A dedicated writer thread owns the file,
/// so records are written whole and in order and a slow disk never blocks
/// the async runtime.
#[derive(Debug)]
pub struct JsonFileSink {
    path: PathBuf,
    tx: mpsc::UnboundedSender<WriterCommand>,
}

#[derive(Debug)]
enum WriterCommand {
    Line(String),
    Flush(std_mpsc::SyncSender<()>),
}

impl JsonFileSink {
    /// Open `path` for appending, creating parent directories as needed
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TelemetryError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        let (tx, rx) = mpsc::unbounded_channel();
        std::thread::Builder::new()
            .name("telemetry-writer".to_string())
            .spawn({
                let path = path.clone();
                move || write_loop(file, &path, rx)
            })?;

        Ok(Self { path, tx })
    }

    /// File being written
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Block until every record handed to the sink so far is on disk
    pub fn flush(&self) {
        let (ack_tx, ack_rx) = std_mpsc::sync_channel(1);
        if self.tx.send(WriterCommand::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }
    }
}

fn write_loop(mut file: File, path: &Path, mut rx: mpsc::UnboundedReceiver<WriterCommand>) {
    while let Some(command) = rx.blocking_recv() {
        match command {
            WriterCommand::Line(line) => {
                if let Err(e) = file.write_all(line.as_bytes()).and_then(|()| file.flush()) {
                    warn!(path = %path.display(), error = %e, "Failed to write telemetry record");
                }
            }
            WriterCommand::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
    debug!(path = %path.display(), "Telemetry writer stopped");
}

impl TelemetrySink for JsonFileSink {
    fn record(&self, record: &TelemetryRecord) {
        let mut line = record.to_json_line();
        line.push('\n');

        if self.tx.send(WriterCommand::Line(line)).is_err() {
            warn!(path = %self.path.display(), "Telemetry writer is gone, record dropped");
        }
    }
}

/// Keeps records in memory
#[derive(Debug, Default)]
pub struct InMemorySink {
    records: Mutex<Vec<TelemetryRecord>>,
}

impl InMemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded entries
    pub fn records(&self) -> Vec<TelemetryRecord> {
        self.records.lock().clone()
    }

    /// Number of recorded entries
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl TelemetrySink for InMemorySink {
    fn record(&self, record: &TelemetryRecord) {
        self.records.lock().push(record.clone());
    }
}

/// Forwards every record to several sinks
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn TelemetrySink>>,
}

impl FanoutSink {
    /// Create an empty fanout
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Number of sinks
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Whether there are no sinks
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl TelemetrySink for FanoutSink {
    fn record(&self, record: &TelemetryRecord) {
        for sink in &self.sinks {
            sink.record(record);
        }
    }
}
