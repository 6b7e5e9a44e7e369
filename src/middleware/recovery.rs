//! Panic recovery.
//!
//! Outermost middleware: nothing downstream can escape as a raw panic.
//! A panic becomes an ERROR log line carrying request context plus a
//! structured response; a payload that is itself an `AppError` keeps its
//! mapped status, anything else surfaces as a generic 500.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::FutureExt;
use serde_json::json;
use std::net::SocketAddr;

use crate::errors::AppError;
use crate::http::request::{sanitize_for_log, REQUEST_ID_HEADER};
use crate::http::server::AppState;
use crate::middleware::headers::apply_security_headers;
use crate::observability::metrics;

pub async fn recover(State(state): State<AppState>, req: Request, next: Next) -> Response {
    // Captured up front: the request is consumed by the handler before we
    // know whether it panicked.
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let method = req.method().clone();
    let path = sanitize_for_log(req.uri().path());
    let remote_addr = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_default();

    let mut response = match AssertUnwindSafe(next.run(req)).catch_unwind().await {
        Ok(response) => response,
        Err(payload) => {
            metrics::record_panic_recovered();
            let error = panic_message(payload.as_ref());

            if let Some(app_error) = payload.downcast_ref::<AppError>() {
                tracing::error!(
                    request_id = %request_id,
                    method = %method,
                    path = %path,
                    remote_addr = %remote_addr,
                    error = %app_error,
                    error_type = "panic_domain_error",
                    "Recovered from panic with domain error"
                );
                (
                    app_error.status(),
                    Json(json!({ "error": app_error.public_message() })),
                )
                    .into_response()
            } else {
                tracing::error!(
                    request_id = %request_id,
                    method = %method,
                    path = %path,
                    remote_addr = %remote_addr,
                    error = %error,
                    error_type = "panic_unknown_error",
                    "Recovered from panic with unknown error"
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal Server Error" })),
                )
                    .into_response()
            }
        }
    };

    // Responses produced outside the headers middleware (panics, timeouts,
    // CORS rejections) still need the security header set.
    apply_security_headers(&state.config, response.headers_mut());
    response
}

/// Convert a panic payload to a message: strings as-is, anything else is
/// opaque.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(e) = payload.downcast_ref::<AppError>() {
        e.to_string()
    } else {
        "unknown panic".to_string()
    }
}
