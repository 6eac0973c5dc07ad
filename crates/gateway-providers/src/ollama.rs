//! Ollama backend.
//!
//! Streams from `POST {base_url}/api/chat`. The response body is
//! newline-delimited JSON; each line carries `message.content` and the last
//! one has `done: true`.

use async_stream::try_stream;
use async_trait::async_trait;
use futures_util::StreamExt;
use gateway_core::{GatewayError, GatewayResult, ModelBackend, TokenStream};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, trace, warn};

const BACKEND_NAME: &str = "ollama";

/// Ollama backend configuration
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Server base URL, e.g. `http://localhost:11434`
    pub base_url: String,
    /// Model to run
    pub model: String,
    /// TCP connect timeout
    pub connect_timeout: Duration,
}

impl OllamaConfig {
    /// Create a configuration for `model` served at `base_url`
    #[must_use]
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            connect_timeout: Duration::from_secs(5),
        }
    }

    /// Set the connect timeout
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: [OllamaMessage<'a>; 1],
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OllamaMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct OllamaChunk {
    #[serde(default)]
    message: Option<OllamaChunkMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaChunkMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaErrorBody {
    error: String,
}

/// Model backend talking to an Ollama server
#[derive(Debug, Clone)]
pub struct OllamaBackend {
    config: OllamaConfig,
    client: Client,
}

impl OllamaBackend {
    /// Create a new Ollama backend
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(config: OllamaConfig) -> GatewayResult<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(16)
            .build()
            .map_err(|e| GatewayError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    fn error_message(status: u16, body: &str) -> String {
        serde_json::from_str::<OllamaErrorBody>(body)
            .map(|b| b.error)
            .ok()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| format!("Ollama returned HTTP {status}"))
    }

    fn decode_line(raw: &[u8]) -> GatewayResult<&str> {
        std::str::from_utf8(raw)
            .map(str::trim)
            .map_err(|e| GatewayError::stream(format!("Invalid UTF-8 in Ollama stream: {e}")))
    }

    /// Parse one NDJSON line into a token, `None` for a line without content.
    fn parse_line(line: &str) -> GatewayResult<(Option<String>, bool)> {
        let chunk: OllamaChunk = serde_json::from_str(line)
            .map_err(|e| GatewayError::stream(format!("Invalid Ollama stream chunk: {e}")))?;

        if let Some(error) = chunk.error {
            return Err(GatewayError::stream(error));
        }

        let token = chunk
            .message
            .map(|m| m.content)
            .filter(|content| !content.is_empty());
        Ok((token, chunk.done))
    }
}

#[async_trait]
impl ModelBackend for OllamaBackend {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    async fn invoke(&self, prompt: &str) -> GatewayResult<TokenStream> {
        let body = OllamaChatRequest {
            model: &self.config.model,
            messages: [OllamaMessage {
                role: "user",
                content: prompt,
            }],
            stream: true,
        };

        debug!(model = %self.config.model, url = %self.config.chat_url(), "Invoking Ollama");

        let response = self
            .client
            .post(self.config.chat_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::backend(BACKEND_NAME, format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = Self::error_message(status.as_u16(), &body);
            warn!(status = status.as_u16(), error = %message, "Ollama rejected request");
            return Err(GatewayError::backend_with_status(
                BACKEND_NAME,
                message,
                status.as_u16(),
            ));
        }

        let stream = try_stream! {
            let mut byte_stream = response.bytes_stream();
            let mut buffer: Vec<u8> = Vec::new();

            // Lines are decoded only once complete, so a multi-byte character
            // split across chunks is never mangled.
            'read: while let Some(chunk_result) = byte_stream.next().await {
                let chunk = chunk_result
                    .map_err(|e| GatewayError::stream(format!("Stream error: {e}")))?;
                buffer.extend_from_slice(&chunk);

                while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                    let raw: Vec<u8> = buffer.drain(..=pos).collect();
                    let line = Self::decode_line(&raw)?;
                    if line.is_empty() {
                        continue;
                    }
                    trace!(line = %line, "Ollama chunk");

                    let (token, done) = Self::parse_line(line)?;
                    if let Some(token) = token {
                        yield token;
                    }
                    if done {
                        break 'read;
                    }
                }
            }

            let rest = Self::decode_line(&buffer)?;
            if !rest.is_empty() {
                let (token, _) = Self::parse_line(rest)?;
                if let Some(token) = token {
                    yield token;
                }
            }
        };

        Ok(Box::pin(stream))
    }
}
