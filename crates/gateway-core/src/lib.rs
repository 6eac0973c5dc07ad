//! # Gateway Core
//!
//! Core types, traits, and error handling for the streaming chat gateway.
//!
//! This crate provides the foundational pieces used throughout the gateway:
//! - Request and identity types
//! - The `ModelBackend` abstraction over language-model providers
//! - Error types and handling
//! - Token limiting and SSE formatting of token streams

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod error;
pub mod request;
pub mod streaming;
pub mod types;

// Re-export commonly used types
pub use backend::{ModelBackend, TokenStream};
pub use error::{GatewayError, GatewayResult};
pub use request::ChatRequest;
pub use streaming::{
    format_stream, limit_tokens, Fragment, SseEvent, DONE_MARKER, ERROR_MARKER,
    STOP_SEQUENCE_MAX_TOKENS,
};
pub use types::{Identity, StreamOutcome};
