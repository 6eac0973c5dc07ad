//! # Gateway Server
//!
//! HTTP server for the streaming chat gateway.
//!
//! This crate provides:
//! - Axum-based HTTP server with graceful shutdown
//! - `POST /chat` streaming Server-Sent Events, `GET /health`, `GET /metrics`
//! - Bearer-token authentication
//! - The per-request pipeline tying backend, limits, timeout and telemetry together

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod pipeline;
pub mod routes;
pub mod server;
pub mod shutdown;
pub mod state;

// Re-export main types
pub use auth::{AuthError, Authenticator, StaticTokenAuthenticator};
pub use error::ApiError;
pub use pipeline::RequestPipeline;
pub use routes::create_router;
pub use server::{Server, ServerConfig};
pub use shutdown::shutdown_signal;
pub use state::{AppState, AppStateBuilder};
