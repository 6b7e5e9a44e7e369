//! Request context: id, client IP, span, and the per-request deadline.
//!
//! Runs immediately inside recovery. Installs `RequestId` and `ClientIp`
//! extensions for everything downstream, wraps the rest of the chain in a
//! tracing span, and cuts the request off at the configured deadline.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::Instrument;

use crate::http::request::{self, sanitize_for_log, ClientIp, RequestId, REQUEST_ID_HEADER};
use crate::http::server::AppState;

pub async fn request_context(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    mut req: Request,
    next: Next,
) -> Response {
    let request_id = request::request_id(req.headers());
    let client_ip = request::client_ip(req.headers(), peer);
    let method = req.method().clone();
    let path = sanitize_for_log(req.uri().path());

    // Downstream middleware and handlers read these from extensions; the
    // header is normalized so recovery sees the same id we mint here.
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        req.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    req.extensions_mut().insert(RequestId(request_id.clone()));
    req.extensions_mut().insert(ClientIp(client_ip.clone()));

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        path = %path,
    );

    let deadline = state.config.app.request_timeout();
    let outcome = tokio::time::timeout(deadline, next.run(req))
        .instrument(span)
        .await;

    let mut response = match outcome {
        Ok(response) => response,
        Err(_) => {
            tracing::error!(
                request_id = %request_id,
                method = %method,
                path = %path,
                client_ip = %client_ip,
                timeout_secs = deadline.as_secs(),
                "Request exceeded deadline"
            );
            (
                StatusCode::GATEWAY_TIMEOUT,
                Json(json!({ "error": "Request timed out" })),
            )
                .into_response()
        }
    };

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
