//! # Gateway Providers
//!
//! Model backend implementations for the chat gateway.
//!
//! Currently supported:
//! - Ollama (self-hosted, `/api/chat` NDJSON streaming)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod factory;
pub mod ollama;

// Re-export main types
pub use factory::backend_from_config;
pub use ollama::{OllamaBackend, OllamaConfig};
