//! Token limiting and Server-Sent-Events formatting.
//!
//! Both stages are lazy stream adapters:
//! - [`limit_tokens`] caps a raw token stream at `max_tokens` real tokens and
//!   appends a truncation sentinel when it cuts the stream short.
//! - [`format_stream`] turns fragments into wire-ready SSE events and always
//!   terminates with a `[DONE]` event, converting a mid-stream failure into
//!   an inline `[ERROR]` event first.

use crate::error::GatewayResult;
use async_stream::stream;
use futures::stream::Stream;
use futures_util::StreamExt;
use std::borrow::Cow;
use std::fmt;

/// Sentinel emitted when the output token cap is reached
pub const STOP_SEQUENCE_MAX_TOKENS: &str = "[STOP_SEQUENCE_MAX_TOKENS]";

/// Terminal marker, always the last event of a response
pub const DONE_MARKER: &str = "[DONE]";

/// Prefix of in-band error payloads
pub const ERROR_MARKER: &str = "[ERROR]";

/// Output of the token limiter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// A real, non-empty model token
    Token(String),
    /// The output cap was reached; no more tokens follow
    MaxTokensReached,
}

impl Fragment {
    /// Payload text of this fragment
    pub fn as_str(&self) -> &str {
        match self {
            Self::Token(token) => token,
            Self::MaxTokensReached => STOP_SEQUENCE_MAX_TOKENS,
        }
    }
}

/// One Server-Sent Event of a chat response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// A token or the truncation sentinel
    Fragment(Fragment),
    /// In-band failure report
    Error(String),
    /// End of stream
    Done,
}

impl SseEvent {
    /// Event reporting that the request ran out of time
    pub fn timed_out() -> Self {
        Self::Error(crate::GatewayError::Timeout.to_string())
    }

    /// Whether this event carries model output rather than a control marker
    pub fn is_token(&self) -> bool {
        matches!(self, Self::Fragment(Fragment::Token(_)))
    }

    /// Payload written after `data: `
    pub fn payload(&self) -> Cow<'_, str> {
        match self {
            Self::Fragment(fragment) => Cow::Borrowed(fragment.as_str()),
            Self::Error(message) => Cow::Owned(format!("{ERROR_MARKER} {message}")),
            Self::Done => Cow::Borrowed(DONE_MARKER),
        }
    }

    /// Wire encoding: `data: <payload>\n\n`.
    ///
    /// A payload spanning several lines becomes one `data:` line per line so
    /// the event stays framed; clients rejoin them with `\n`.
    pub fn to_wire(&self) -> String {
        let payload = self.payload();
        let normalized: Cow<'_, str> = if payload.contains('\r') {
            Cow::Owned(payload.replace("\r\n", "\n").replace('\r', "\n"))
        } else {
            payload
        };

        let mut out = String::with_capacity(normalized.len() + 8);
        for line in normalized.split('\n') {
            out.push_str("data: ");
            out.push_str(line);
            out.push('\n');
        }
        out.push('\n');
        out
    }
}

impl fmt::Display for SseEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}

/// Bound a token stream to at most `max_tokens` real tokens.
///
/// Empty fragments are dropped without counting. Once `max_tokens` tokens
/// have been emitted a single [`Fragment::MaxTokensReached`] follows and the
/// source is not polled again. A source that ends early ends the output with
/// no sentinel. A source error is passed through and ends the output.
pub fn limit_tokens<S>(
    tokens: S,
    max_tokens: usize,
) -> impl Stream<Item = GatewayResult<Fragment>> + Send
where
    S: Stream<Item = GatewayResult<String>> + Send,
{
    stream! {
        futures_util::pin_mut!(tokens);
        let mut emitted = 0usize;

        while let Some(item) = tokens.next().await {
            match item {
                Ok(token) if token.is_empty() => continue,
                Ok(token) => {
                    if emitted == max_tokens {
                        yield Ok(Fragment::MaxTokensReached);
                        break;
                    }
                    yield Ok(Fragment::Token(token));
                    emitted += 1;
                    if emitted == max_tokens {
                        yield Ok(Fragment::MaxTokensReached);
                        break;
                    }
                }
                Err(e) => {
                    yield Err(e);
                    break;
                }
            }
        }
    }
}

/// Format fragments as SSE events.
///
/// Events already produced stay valid when the source fails: the failure
/// becomes one [`SseEvent::Error`] and [`SseEvent::Done`] is always last.
pub fn format_stream<S>(fragments: S) -> impl Stream<Item = SseEvent> + Send
where
    S: Stream<Item = GatewayResult<Fragment>> + Send,
{
    stream! {
        futures_util::pin_mut!(fragments);

        while let Some(item) = fragments.next().await {
            match item {
                Ok(fragment) => {
                    yield SseEvent::Fragment(fragment);
                }
                Err(e) => {
                    yield SseEvent::Error(e.to_string());
                    break;
                }
            }
        }

        yield SseEvent::Done;
    }
}
