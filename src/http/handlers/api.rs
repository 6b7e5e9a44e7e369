//! JSON API handlers: validation helpers, form listing, subscriptions,
//! health and metrics.

use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::errors::AppError;
use crate::http::server::AppState;

#[derive(Debug, Deserialize)]
pub struct EmailPayload {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordPayload {
    #[serde(default)]
    pub password: String,
}

fn email_is_valid(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        }
        None => false,
    }
}

/// Client-side form helpers call this while the user types; it never
/// requires CSRF and carries no session side effects.
pub async fn validate_email(Json(payload): Json<EmailPayload>) -> Json<serde_json::Value> {
    Json(json!({ "valid": email_is_valid(&payload.email) }))
}

pub async fn validate_password(Json(payload): Json<PasswordPayload>) -> Json<serde_json::Value> {
    let valid = payload.password.len() >= 8;
    Json(json!({
        "valid": valid,
        "message": if valid { "" } else { "password must be at least 8 characters" },
    }))
}

pub async fn list_forms(State(state): State<AppState>) -> Result<Response, AppError> {
    let forms = state.forms.list_forms().await?;
    Ok(Json(json!({ "forms": forms })).into_response())
}

pub async fn subscribe(
    State(state): State<AppState>,
    Json(payload): Json<EmailPayload>,
) -> Result<Response, AppError> {
    state.subscriptions.subscribe(&payload.email).await?;
    Ok((StatusCode::CREATED, Json(json!({ "status": "subscribed" }))).into_response())
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Prometheus exposition. 404 when the recorder is absent (tests) or the
/// endpoint is disabled by configuration.
pub async fn metrics(State(state): State<AppState>) -> Response {
    if !state.config.observability.metrics_enabled {
        return StatusCode::NOT_FOUND.into_response();
    }
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Development-only route for exercising panic recovery end to end.
pub async fn debug_panic(Query(params): Query<HashMap<String, String>>) -> Response {
    let message = params
        .get("message")
        .cloned()
        .unwrap_or_else(|| "debug panic requested".to_string());
    panic!("{message}");
}

/// Development-only route that holds the response for `ms` milliseconds,
/// for exercising the request deadline end to end.
pub async fn debug_slow(Query(params): Query<HashMap<String, String>>) -> Json<serde_json::Value> {
    let ms: u64 = params
        .get("ms")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
    Json(json!({ "slept_ms": ms }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation_rules() {
        assert!(email_is_valid("a@example.com"));
        assert!(!email_is_valid("aexample.com"));
        assert!(!email_is_valid("@example.com"));
        assert!(!email_is_valid("a@nodot"));
        assert!(!email_is_valid("a@.com"));
    }
}
