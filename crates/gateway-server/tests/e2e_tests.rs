//! End-to-end tests for the chat gateway.
//!
//! These tests drive the full router with scripted in-process backends:
//! - Authentication and validation ordering
//! - SSE body framing on success, truncation, failure and timeout
//! - Telemetry emitted per request

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use futures::stream::{self, StreamExt};
use gateway_config::LimitsConfig;
use gateway_core::{GatewayError, GatewayResult, Identity, ModelBackend, StreamOutcome, TokenStream};
use gateway_server::routes::create_router;
use gateway_server::{AppState, StaticTokenAuthenticator};
use gateway_telemetry::{InMemorySink, JsonFileSink, TelemetrySink};
use http_body_util::BodyExt;
use secrecy::SecretString;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const SECRET: &str = "test-secret";

/// Backend yielding a fixed script of tokens
struct ScriptedBackend {
    tokens: Vec<&'static str>,
    /// Sleep before every token after the first
    gap: Duration,
    /// Index of the token replaced by a mid-stream failure
    fail_at: Option<usize>,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    fn new(tokens: Vec<&'static str>) -> Self {
        Self {
            tokens,
            gap: Duration::ZERO,
            fail_at: None,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn invoke(&self, _prompt: &str) -> GatewayResult<TokenStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let gap = self.gap;
        let fail_at = self.fail_at;
        let tokens: Vec<String> = self.tokens.iter().map(|t| (*t).to_string()).collect();

        let stream = stream::iter(tokens.into_iter().enumerate()).then(move |(i, token)| async move {
            if i > 0 && !gap.is_zero() {
                tokio::time::sleep(gap).await;
            }
            if fail_at == Some(i) {
                return Err(GatewayError::stream("boom"));
            }
            Ok(token)
        });
        Ok(Box::pin(stream))
    }
}

/// Backend whose invocation fails outright
struct UnreachableBackend {
    calls: AtomicUsize,
}

#[async_trait]
impl ModelBackend for UnreachableBackend {
    fn name(&self) -> &str {
        "unreachable"
    }

    async fn invoke(&self, _prompt: &str) -> GatewayResult<TokenStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(GatewayError::backend("unreachable", "x"))
    }
}

fn limits() -> LimitsConfig {
    LimitsConfig::default()
}

fn authenticator() -> Arc<StaticTokenAuthenticator> {
    Arc::new(StaticTokenAuthenticator::new(
        &SecretString::new(SECRET.to_string()),
        Identity::new("demo-user", "demo-tenant"),
    ))
}

/// Create test application state
fn create_test_state(
    backend: Arc<dyn ModelBackend>,
    limits: LimitsConfig,
) -> (AppState, Arc<InMemorySink>) {
    let sink = Arc::new(InMemorySink::new());
    let state = AppState::builder()
        .authenticator(authenticator())
        .backend(backend)
        .limits(limits)
        .sink(sink.clone())
        .build()
        .unwrap();
    (state, sink)
}

fn chat_request(body: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/chat")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn message(text: &str) -> String {
    json!({ "message": text }).to_string()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[cfg(test)]
mod health_endpoint_tests {
    use super::*;

    #[tokio::test]
    async fn test_health_endpoint_returns_ok() {
        let (state, _) = create_test_state(Arc::new(ScriptedBackend::new(vec![])), limits());
        let app = create_router(state);

        let request = Request::builder()
            .method(Method::GET)
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["status"], "healthy");
        assert!(json["version"].is_string());
    }

    #[tokio::test]
    async fn test_request_id_is_echoed() {
        let (state, _) = create_test_state(Arc::new(ScriptedBackend::new(vec![])), limits());
        let app = create_router(state);

        let request = Request::builder()
            .uri("/health")
            .header("x-request-id", "trace-me")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.headers()["x-request-id"], "trace-me");
    }
}

#[cfg(test)]
mod streaming_tests {
    use super::*;

    #[tokio::test]
    async fn test_successful_stream() {
        let backend = Arc::new(ScriptedBackend::new(vec!["Hello", " ", "world"]));
        let (state, sink) = create_test_state(backend.clone(), limits());
        let app = create_router(state);

        let response = app
            .oneshot(chat_request(&message("Hello"), Some(SECRET)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");

        let body = body_string(response).await;
        assert_eq!(
            body,
            "data: Hello\n\ndata:  \n\ndata: world\n\ndata: [DONE]\n\n"
        );
        assert_eq!(backend.calls(), 1);

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, StreamOutcome::Ok);
        assert_eq!(records[0].output_tokens, 3);
        assert_eq!(records[0].input_length, 5);
        assert_eq!(records[0].user_id, "demo-user");
        assert_eq!(records[0].tenant_id, "demo-tenant");
    }

    #[tokio::test]
    async fn test_output_is_truncated() {
        let backend = Arc::new(ScriptedBackend::new(vec!["a", "b", "c", "d", "e"]));
        let limits = LimitsConfig {
            max_output_tokens: 2,
            ..limits()
        };
        let (state, sink) = create_test_state(backend, limits);

        let response = create_router(state)
            .oneshot(chat_request(&message("count"), Some(SECRET)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_string(response).await,
            "data: a\n\ndata: b\n\ndata: [STOP_SEQUENCE_MAX_TOKENS]\n\ndata: [DONE]\n\n"
        );
        assert_eq!(sink.records()[0].output_tokens, 2);
        assert_eq!(sink.records()[0].status, StreamOutcome::Ok);
    }

    #[tokio::test]
    async fn test_mid_stream_error_is_in_band() {
        let backend = Arc::new(ScriptedBackend {
            fail_at: Some(1),
            ..ScriptedBackend::new(vec!["a", "b", "c"])
        });
        let (state, sink) = create_test_state(backend, limits());

        let response = create_router(state)
            .oneshot(chat_request(&message("x"), Some(SECRET)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_string(response).await,
            "data: a\n\ndata: [ERROR] boom\n\ndata: [DONE]\n\n"
        );

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, StreamOutcome::StreamError);
        assert_eq!(records[0].output_tokens, 1);
    }

    #[tokio::test]
    async fn test_timeout_mid_stream() {
        let backend = Arc::new(ScriptedBackend {
            gap: Duration::from_millis(100),
            ..ScriptedBackend::new(vec!["first", "second"])
        });
        let limits = LimitsConfig {
            request_timeout: Duration::from_millis(50),
            ..limits()
        };
        let (state, sink) = create_test_state(backend, limits);

        let response = create_router(state)
            .oneshot(chat_request(&message("slow"), Some(SECRET)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(body.ends_with("data: [ERROR] Request timed out\n\ndata: [DONE]\n\n"));
        assert!(!body.contains("second"));

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, StreamOutcome::Timeout);
        assert_eq!(records[0].backend_message.as_deref(), Some("Request timed out"));
    }

    #[tokio::test]
    async fn test_multiline_token_framing() {
        let backend = Arc::new(ScriptedBackend::new(vec!["line1\nline2"]));
        let (state, _) = create_test_state(backend, limits());

        let response = create_router(state)
            .oneshot(chat_request(&message("x"), Some(SECRET)))
            .await
            .unwrap();

        assert_eq!(
            body_string(response).await,
            "data: line1\ndata: line2\n\ndata: [DONE]\n\n"
        );
    }

    #[tokio::test]
    async fn test_identical_requests_identical_bodies() {
        let backend = Arc::new(ScriptedBackend::new(vec!["same", " ", "output"]));
        let (state, sink) = create_test_state(backend, limits());

        let first = body_string(
            create_router(state.clone())
                .oneshot(chat_request(&message("m"), Some(SECRET)))
                .await
                .unwrap(),
        )
        .await;
        let second = body_string(
            create_router(state)
                .oneshot(chat_request(&message("m"), Some(SECRET)))
                .await
                .unwrap(),
        )
        .await;

        assert_eq!(first, second);
        assert_eq!(sink.len(), 2);
    }
}

#[cfg(test)]
mod validation_tests {
    use super::*;

    #[tokio::test]
    async fn test_message_too_long() {
        let backend = Arc::new(ScriptedBackend::new(vec!["never"]));
        let (state, sink) = create_test_state(backend.clone(), limits());

        let response = create_router(state)
            .oneshot(chat_request(&message(&"a".repeat(2001)), Some(SECRET)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let json = body_json(response).await;
        assert!(json["detail"].as_str().unwrap().contains("2000"));
        assert_eq!(backend.calls(), 0);
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_body_over_transport_limit() {
        let backend = Arc::new(ScriptedBackend::new(vec!["never"]));
        let (state, sink) = create_test_state(backend.clone(), limits());

        let response = create_router(state)
            .oneshot(chat_request(&message(&"a".repeat(3_000_000)), Some(SECRET)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let json = body_json(response).await;
        assert_eq!(json["detail"], "Message too long. Max 2000 characters.");
        assert_eq!(backend.calls(), 0);
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_message_at_limit_is_accepted() {
        let backend = Arc::new(ScriptedBackend::new(vec!["ok"]));
        let (state, _) = create_test_state(backend, limits());

        let response = create_router(state)
            .oneshot(chat_request(&message(&"é".repeat(2000)), Some(SECRET)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_empty_message() {
        let backend = Arc::new(ScriptedBackend::new(vec!["never"]));
        let (state, _) = create_test_state(backend.clone(), limits());
        let app = create_router(state);

        for text in ["", "   \n\t"] {
            let response = app
                .clone()
                .oneshot(chat_request(&message(text), Some(SECRET)))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(body_json(response).await["detail"], "Missing message");
        }
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let backend = Arc::new(ScriptedBackend::new(vec!["never"]));
        let (state, _) = create_test_state(backend.clone(), limits());
        let app = create_router(state);

        for body in ["not json", r#"{"msg":"hi"}"#, r#"{"message":42}"#] {
            let response = app
                .clone()
                .oneshot(chat_request(body, Some(SECRET)))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        }
        assert_eq!(backend.calls(), 0);
    }
}

#[cfg(test)]
mod auth_tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_credentials() {
        let backend = Arc::new(ScriptedBackend::new(vec!["never"]));
        let (state, sink) = create_test_state(backend.clone(), limits());

        let response = create_router(state)
            .oneshot(chat_request(&message("Hello"), None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(response).await["detail"], "Not authenticated");
        assert_eq!(backend.calls(), 0);
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_credentials() {
        let backend = Arc::new(ScriptedBackend::new(vec!["never"]));
        let (state, sink) = create_test_state(backend.clone(), limits());

        let response = create_router(state)
            .oneshot(chat_request(&message("Hello"), Some("wrong")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
        assert_eq!(
            body_json(response).await["detail"],
            "Invalid authentication credentials"
        );
        assert_eq!(backend.calls(), 0);
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_auth_checked_before_body() {
        let backend = Arc::new(ScriptedBackend::new(vec!["never"]));
        let (state, _) = create_test_state(backend, limits());
        let app = create_router(state);

        let response = app
            .clone()
            .oneshot(chat_request(&message(""), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .oneshot(chat_request("not json", Some("wrong")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}

#[cfg(test)]
mod backend_error_tests {
    use super::*;

    #[tokio::test]
    async fn test_backend_invocation_failure() {
        let backend = Arc::new(UnreachableBackend {
            calls: AtomicUsize::new(0),
        });
        let (state, sink) = create_test_state(backend.clone(), limits());

        let response = create_router(state)
            .oneshot(chat_request(&message("Hello"), Some(SECRET)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let detail = body_json(response).await["detail"]
            .as_str()
            .unwrap()
            .to_string();
        assert_eq!(detail, "LLM backend error: x");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, StreamOutcome::BackendError);
        assert_eq!(records[0].output_tokens, 0);
        assert_eq!(records[0].backend_status, Some(502));
    }
}

#[cfg(test)]
mod telemetry_tests {
    use super::*;

    #[tokio::test]
    async fn test_metrics_reflect_requests() {
        let backend = Arc::new(ScriptedBackend::new(vec!["a"]));
        let (state, _) = create_test_state(backend, limits());
        let app = create_router(state);

        let response = app
            .clone()
            .oneshot(chat_request(&message("Hello"), Some(SECRET)))
            .await
            .unwrap();
        body_string(response).await;

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let text = body_string(response).await;
        assert!(text.contains("gateway_chat_requests_total{status=\"ok\"} 1"));
    }

    #[tokio::test]
    async fn test_file_sink_writes_one_line_per_request() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("chat_api.log");
        let file_sink = Arc::new(JsonFileSink::open(&path).unwrap());

        let state = AppState::builder()
            .authenticator(authenticator())
            .backend(Arc::new(ScriptedBackend::new(vec!["a", "b"])))
            .limits(limits())
            .sink(file_sink.clone() as Arc<dyn TelemetrySink>)
            .build()
            .unwrap();
        let app = create_router(state);

        for _ in 0..3 {
            let response = app
                .clone()
                .oneshot(chat_request(&message("Hello"), Some(SECRET)))
                .await
                .unwrap();
            body_string(response).await;
        }
        file_sink.flush();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<Value> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        for line in lines {
            assert_eq!(line["status"], "ok");
            assert_eq!(line["output_tokens"], 2);
            assert_eq!(line["backend_status"], 200);
        }
    }
}
