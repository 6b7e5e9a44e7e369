//! Request-level helpers: request ids, client IP, path classification.
//!
//! # Design Decisions
//! - Request ID taken from `X-Request-ID` when the caller supplies one,
//!   freshly generated otherwise, and echoed back on the response
//! - Client IP honors `X-Forwarded-For` (leftmost entry) before falling
//!   back to the socket peer address
//! - Path parsing is allocation-free string slicing, no regex

use axum::http::{HeaderMap, Method};
use std::net::SocketAddr;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request id attached to the envelope by the context middleware.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Client IP attached to the envelope by the context middleware.
#[derive(Debug, Clone)]
pub struct ClientIp(pub String);

/// Take the caller's request id or mint a new one.
pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Best-effort client IP: leftmost `X-Forwarded-For` entry, then
/// `X-Real-IP`, then the peer address.
pub fn client_ip(headers: &HeaderMap, peer: SocketAddr) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }
    peer.ip().to_string()
}

/// Extract the form id from a submission path (`/forms/{id}/submissions`).
pub fn submission_form_id(path: &str) -> Option<&str> {
    let rest = path.strip_prefix("/forms/")?;
    let (form_id, tail) = rest.split_once('/')?;
    if tail == "submissions" && !form_id.is_empty() {
        Some(form_id)
    } else {
        None
    }
}

/// An HTML client accepts `text/html` or is browsing outside the API.
pub fn is_html_client(headers: &HeaderMap, path: &str) -> bool {
    let accepts_html = headers
        .get(axum::http::header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("text/html"))
        .unwrap_or(false);
    accepts_html || !path.starts_with("/api/")
}

/// Unsafe methods mutate state and get the full CSRF / rate-limit
/// treatment.
pub fn is_unsafe_method(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Replace control characters with spaces so attacker-controlled paths
/// cannot forge log lines.
pub fn sanitize_for_log(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}
