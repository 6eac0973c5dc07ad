//! Identity and outcome types shared by the pipeline and telemetry.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Caller identity produced by an authenticator.
///
/// Opaque to the gateway: it is only carried into telemetry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    /// User identifier
    pub user_id: String,
    /// Tenant identifier
    pub tenant_id: String,
}

impl Identity {
    /// Create a new identity
    pub fn new(user_id: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            tenant_id: tenant_id.into(),
        }
    }
}

/// Terminal status of one request's stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamOutcome {
    /// Stream ran to completion
    Ok,
    /// Wall-clock budget exceeded
    Timeout,
    /// Backend failed before streaming started
    BackendError,
    /// Stream failed after it started
    #[serde(rename = "error")]
    StreamError,
}

impl StreamOutcome {
    /// Status string as written to telemetry
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Timeout => "timeout",
            Self::BackendError => "backend_error",
            Self::StreamError => "error",
        }
    }
}

impl fmt::Display for StreamOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
