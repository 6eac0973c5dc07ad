//! HTTP request handlers.

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures_util::StreamExt;
use gateway_core::{ChatRequest, GatewayError};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tracing::{debug, instrument};

use crate::error::ApiError;
use crate::extractors::{Authenticated, JsonBody, RequestId};
use crate::state::AppState;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
}

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Metrics endpoint (Prometheus format)
pub async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    let metrics = state.metrics.gather();
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics,
    )
}

/// Streaming chat endpoint.
///
/// Authentication runs first (it is extracted before the body), then the
/// message is validated, then the backend is invoked. Anything that fails
/// up to that point is an HTTP error; after it the response is a 200
/// `text/event-stream` and failures are reported in-band.
#[instrument(
    skip_all,
    fields(request_id = %request_id, user_id = %identity.user_id, tenant_id = %identity.tenant_id)
)]
pub async fn chat(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    Authenticated(identity): Authenticated,
    body: Result<JsonBody<ChatRequest>, ApiError>,
) -> Result<Response, ApiError> {
    let max_input_length = state.max_input_length();
    // A body over the transport limit is necessarily an over-long message.
    let JsonBody(request) = body.map_err(|e| {
        if e.status == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::from(GatewayError::MessageTooLong {
                max: max_input_length,
            })
        } else {
            e
        }
    })?;
    request.validate(max_input_length)?;

    debug!(input_length = request.input_length(), "Processing chat request");

    let events = state.pipeline.start(identity, &request).await?;
    let body = Body::from_stream(events.map(|event| Ok::<_, Infallible>(event.to_wire())));

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response())
}
