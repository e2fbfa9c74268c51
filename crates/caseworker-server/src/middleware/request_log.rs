use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

/// Logs `METHOD uri` for every inbound request and the status once the
/// response head is ready. Streamed bodies are still in flight at that point.
pub async fn request_log_middleware(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    tracing::info!("{} {}", method, uri);

    let started = Instant::now();
    let response = next.run(req).await;

    tracing::debug!(
        method = %method,
        uri = %uri,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "response head sent"
    );
    response
}
