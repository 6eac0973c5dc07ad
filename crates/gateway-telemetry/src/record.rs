//! Per-request telemetry record.

use chrono::{DateTime, SecondsFormat, Utc};
use gateway_core::{Identity, StreamOutcome};
use serde::{Deserialize, Serialize, Serializer};
use std::time::Duration;

/// Structured record emitted exactly once per request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    /// When the outcome became known (UTC)
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Caller user id
    pub user_id: String,
    /// Caller tenant id
    pub tenant_id: String,
    /// Message length in characters
    pub input_length: usize,
    /// Real tokens delivered to the client
    pub output_tokens: usize,
    /// Wall time from backend invocation to outcome, 2 decimals
    pub latency_ms: f64,
    /// Terminal status
    pub status: StreamOutcome,
    /// Upstream/outcome status code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_status: Option<u16>,
    /// Upstream/outcome message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_message: Option<String>,
}

fn serialize_timestamp<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Micros, true))
}

impl TelemetryRecord {
    /// Create a record stamped with the current time
    pub fn new(
        identity: &Identity,
        input_length: usize,
        output_tokens: usize,
        latency: Duration,
        status: StreamOutcome,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            user_id: identity.user_id.clone(),
            tenant_id: identity.tenant_id.clone(),
            input_length,
            output_tokens,
            latency_ms: round_millis(latency),
            status,
            backend_status: None,
            backend_message: None,
        }
    }

    /// Attach the backend status and message
    #[must_use]
    pub fn with_backend(mut self, status: u16, message: impl Into<String>) -> Self {
        self.backend_status = Some(status);
        self.backend_message = Some(message.into());
        self
    }

    /// Serialize as a single JSON line (no trailing newline)
    pub fn to_json_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"status":"{}","serialization_error":"{e}"}}"#, self.status)
        })
    }
}

fn round_millis(latency: Duration) -> f64 {
    (latency.as_secs_f64() * 1000.0 * 100.0).round() / 100.0
}
