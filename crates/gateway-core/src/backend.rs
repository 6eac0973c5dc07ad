//! Model backend abstraction.

use crate::error::GatewayResult;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Stream of raw token fragments produced by a backend.
///
/// An `Err` item is a mid-stream failure; the stream must not be polled
/// past it.
pub type TokenStream = BoxStream<'static, GatewayResult<String>>;

/// A language-model provider that turns a prompt into a token stream.
///
/// Implementations are selected once at startup and shared across all
/// requests.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Backend name used in logs and telemetry
    fn name(&self) -> &str;

    /// Start generating a response for `prompt`.
    ///
    /// Failing here (connection refused, upstream rejection) means no stream
    /// was ever produced.
    async fn invoke(&self, prompt: &str) -> GatewayResult<TokenStream>;
}
