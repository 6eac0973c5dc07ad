//! HTTP middleware.

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::{info, info_span, warn, Instrument};

/// Header carrying the request id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Ensure every request has an `x-request-id` and echo it on the response
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let header_name = HeaderName::from_static(REQUEST_ID_HEADER);

    let id = match request.headers().get(&header_name) {
        Some(value) => value.clone(),
        None => {
            let generated = HeaderValue::from_str(&uuid::Uuid::new_v4().to_string())
                .unwrap_or_else(|_| HeaderValue::from_static("unknown"));
            request
                .headers_mut()
                .insert(header_name.clone(), generated.clone());
            generated
        }
    };

    let span = info_span!("request", request_id = id.to_str().unwrap_or("invalid"));
    let mut response = next.run(request).instrument(span).await;
    response.headers_mut().insert(header_name, id);
    response
}

/// Log method, path, status and handler latency of every request
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    if status.is_server_error() {
        warn!(%method, %path, status = status.as_u16(), latency_ms, "Request failed");
    } else {
        info!(%method, %path, status = status.as_u16(), latency_ms, "Request handled");
    }

    response
}
