//! Request logging: one structured INFO line per completed request.

use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::http::request::{sanitize_for_log, ClientIp, RequestId};
use crate::observability::metrics;

pub async fn log_request(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = sanitize_for_log(req.uri().path());
    let request_id = req
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();
    let client_ip = req
        .extensions()
        .get::<ClientIp>()
        .map(|ip| ip.0.clone())
        .unwrap_or_default();

    let started = Instant::now();
    let response = next.run(req).await;
    let latency = started.elapsed();
    let status = response.status();

    metrics::record_request(method.as_str(), status.as_u16());
    tracing::info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status = status.as_u16(),
        latency_ms = latency.as_millis() as u64,
        client_ip = %client_ip,
        "Request completed"
    );

    response
}
