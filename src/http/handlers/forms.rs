//! Form submission intake.
//!
//! The route is public; admission was decided by the per-form CORS policy
//! upstream. The handler normalizes the payload (urlencoded form or JSON)
//! and hands it to the form service.

use axum::body::to_bytes;
use axum::extract::{Path, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::errors::AppError;
use crate::http::server::AppState;

const MAX_SUBMISSION_BYTES: usize = 1024 * 1024;

pub async fn submit(
    State(state): State<AppState>,
    Path(form_id): Path<String>,
    req: Request,
) -> Result<Response, AppError> {
    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let bytes = to_bytes(req.into_body(), MAX_SUBMISSION_BYTES)
        .await
        .map_err(|e| AppError::Validation(format!("unreadable submission body: {e}")))?;

    let payload = if content_type.starts_with("application/json") {
        serde_json::from_slice(&bytes)
            .map_err(|e| AppError::Validation(format!("invalid JSON submission: {e}")))?
    } else {
        // Field names repeat in real forms (checkbox groups); last write
        // wins here, matching typical form backends.
        let mut object = serde_json::Map::new();
        for (name, value) in url::form_urlencoded::parse(&bytes) {
            if name == "_csrf" {
                continue;
            }
            object.insert(name.into_owned(), json!(value.into_owned()));
        }
        serde_json::Value::Object(object)
    };

    state.forms.submit(&form_id, payload).await?;
    tracing::info!(form_id = %form_id, "Submission stored");
    Ok((StatusCode::CREATED, Json(json!({ "status": "received" }))).into_response())
}
