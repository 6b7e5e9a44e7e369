//! Application error taxonomy.
//!
//! Handlers and services return `AppError`; the pipeline maps each variant
//! to an HTTP response. Downstream causes are preserved through `#[source]`
//! so log lines keep the full chain.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Typed error returned by handlers and domain services.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed input: JSON decode failures, missing fields, bad email.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Missing or invalid credentials or session.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Principal's role is insufficient for the resource.
    #[error("access denied: {0}")]
    Authorization(String),

    /// Resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate unique key, e.g. an already-registered email.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Pipeline-generated: the caller exhausted its token bucket.
    #[error("rate limit exceeded")]
    RateLimit { retry_after_secs: u64 },

    /// Pipeline-generated: missing or invalid CSRF token.
    #[error("csrf validation failed")]
    Csrf,

    /// Everything else, including recovered panics. Details go to the logs,
    /// never to the client.
    #[error("internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl AppError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    pub fn internal_with(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// HTTP status this error surfaces as.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::Authorization(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::RateLimit { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Csrf => StatusCode::FORBIDDEN,
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to the client.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Validation(msg) => msg.clone(),
            AppError::Authentication(msg) => msg.clone(),
            AppError::Authorization(msg) => msg.clone(),
            AppError::NotFound(msg) => msg.clone(),
            AppError::Conflict(msg) => msg.clone(),
            AppError::RateLimit { .. } => {
                "Rate limit exceeded: please try again later".to_string()
            }
            AppError::Csrf => String::new(),
            AppError::Internal { .. } => "Internal Server Error".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            // CSRF failures are deliberately opaque: 403 with an empty body.
            AppError::Csrf => StatusCode::FORBIDDEN.into_response(),
            AppError::RateLimit { retry_after_secs } => {
                let mut response = (
                    StatusCode::TOO_MANY_REQUESTS,
                    "Rate limit exceeded: please try again later",
                )
                    .into_response();
                if let Ok(value) = retry_after_secs.to_string().parse() {
                    response.headers_mut().insert("Retry-After", value);
                }
                response
            }
            _ => {
                let status = self.status();
                (status, Json(json!({ "error": self.public_message() }))).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_match_taxonomy() {
        assert_eq!(
            AppError::Validation("bad email".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Authentication("no session".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::Authorization("admins only".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(AppError::Csrf.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::RateLimit {
                retry_after_secs: 1
            }
            .status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AppError::internal("boom").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_error_hides_details() {
        let err = AppError::internal_with(
            "database exploded",
            std::io::Error::new(std::io::ErrorKind::Other, "connection reset"),
        );
        assert_eq!(err.public_message(), "Internal Server Error");
        // The cause chain stays available for logging.
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn csrf_message_is_empty() {
        assert!(AppError::Csrf.public_message().is_empty());
    }
}
