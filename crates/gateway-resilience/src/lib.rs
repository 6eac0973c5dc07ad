//! # Gateway Resilience
//!
//! Resilience primitives for the chat gateway:
//! - Per-request wall-clock deadline with cooperative cancellation

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod timeout;

// Re-export main types
pub use timeout::TimeoutGuard;
