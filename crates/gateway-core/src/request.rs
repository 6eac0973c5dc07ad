//! Chat request type.

use crate::error::{GatewayError, GatewayResult};
use serde::{Deserialize, Serialize};

/// Single-turn chat request accepted by `POST /chat`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// User message forwarded to the model backend
    pub message: String,
}

impl ChatRequest {
    /// Create a new chat request
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Message length in characters
    pub fn input_length(&self) -> usize {
        self.message.chars().count()
    }

    /// Validate the request against the configured input limit
    ///
    /// # Errors
    /// Returns `EmptyMessage` for blank input and `MessageTooLong` when the
    /// message exceeds `max_input_length` characters.
    pub fn validate(&self, max_input_length: usize) -> GatewayResult<()> {
        if self.message.trim().is_empty() {
            return Err(GatewayError::EmptyMessage);
        }
        if self.input_length() > max_input_length {
            return Err(GatewayError::MessageTooLong {
                max: max_input_length,
            });
        }
        Ok(())
    }
}
