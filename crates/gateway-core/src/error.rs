//! Error types for the gateway.

use http::StatusCode;

/// Result alias used across the gateway crates
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Unified gateway error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// Message is empty or whitespace-only
    #[error("Missing message")]
    EmptyMessage,

    /// Message exceeds the configured input length
    #[error("Message too long. Max {max} characters.")]
    MessageTooLong {
        /// Configured maximum, in characters
        max: usize,
    },

    /// The model backend failed before producing a stream
    #[error("{message}")]
    Backend {
        /// Backend name
        backend: String,
        /// Upstream failure description
        message: String,
        /// Upstream HTTP status, when the backend reported one
        status_code: Option<u16>,
    },

    /// The token stream failed after it started
    #[error("{message}")]
    Stream {
        /// Failure description
        message: String,
    },

    /// The request exceeded its wall-clock budget
    #[error("Request timed out")]
    Timeout,

    /// Invalid or unsupported configuration
    #[error("Configuration error: {message}")]
    Configuration {
        /// What is wrong
        message: String,
    },

    /// Unexpected internal failure
    #[error("Internal error: {message}")]
    Internal {
        /// Failure description
        message: String,
    },
}

impl GatewayError {
    /// Backend invocation failure
    pub fn backend(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            backend: backend.into(),
            message: message.into(),
            status_code: None,
        }
    }

    /// Backend invocation failure carrying the upstream status
    pub fn backend_with_status(
        backend: impl Into<String>,
        message: impl Into<String>,
        status_code: u16,
    ) -> Self {
        Self::Backend {
            backend: backend.into(),
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    /// Mid-stream failure
    pub fn stream(message: impl Into<String>) -> Self {
        Self::Stream {
            message: message.into(),
        }
    }

    /// Configuration failure
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Internal failure
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// HTTP status this error maps to when it is detected before streaming
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::EmptyMessage => StatusCode::BAD_REQUEST,
            Self::MessageTooLong { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Backend { .. } => StatusCode::BAD_GATEWAY,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Stream { .. } | Self::Configuration { .. } | Self::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}
