use axum::{body::Body, http::Request, middleware::Next, response::Response};
use std::time::Instant;

/// Log method, path, status and latency of every redirect request.
pub async fn log_latency(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    tracing::debug!(
        %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "redirect request served"
    );
    response
}
