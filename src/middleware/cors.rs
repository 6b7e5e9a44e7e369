//! CORS enforcement.
//!
//! Submission routes (`POST /forms/{id}/submissions`) carry a per-form
//! policy owned by the form's account; the service lookup is memoized in a
//! small TTL cache so hot forms do not hit the backing store per request.
//! Everything else falls back to the global policy from configuration.
//!
//! A disallowed origin on a submission route is rejected outright with no
//! `Access-Control-Allow-Origin` header, preflight and actual request
//! alike. An unknown form yields 404 before any CORS header is emitted.

use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dashmap::DashMap;
use serde_json::json;

use crate::config::CorsConfig;
use crate::http::request::submission_form_id;
use crate::http::server::AppState;
use crate::services::FormCorsPolicy;

const POSITIVE_TTL: Duration = Duration::from_secs(60);
const NEGATIVE_TTL: Duration = Duration::from_secs(10);
const PREFLIGHT_MAX_AGE: &str = "300";

struct CacheEntry {
    policy: Option<FormCorsPolicy>,
    fetched_at: Instant,
}

/// TTL cache over per-form CORS policy lookups. Negative entries (unknown
/// forms) expire faster so a newly created form becomes reachable quickly.
pub struct CorsCache {
    entries: DashMap<String, CacheEntry>,
}

impl CorsCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// A cached policy lookup, `None` when the entry is missing or stale.
    /// The outer Option is cache presence, the inner one form existence.
    pub fn get(&self, form_id: &str) -> Option<Option<FormCorsPolicy>> {
        let entry = self.entries.get(form_id)?;
        let ttl = if entry.policy.is_some() {
            POSITIVE_TTL
        } else {
            NEGATIVE_TTL
        };
        if entry.fetched_at.elapsed() < ttl {
            Some(entry.policy.clone())
        } else {
            None
        }
    }

    pub fn put(&self, form_id: &str, policy: Option<FormCorsPolicy>) {
        self.entries.insert(
            form_id.to_string(),
            CacheEntry {
                policy,
                fetched_at: Instant::now(),
            },
        );
    }

    /// Drop a cached policy, forcing a fresh lookup on the next request.
    pub fn invalidate(&self, form_id: &str) {
        self.entries.remove(form_id);
    }
}

impl Default for CorsCache {
    fn default() -> Self {
        Self::new()
    }
}

pub async fn enforce_cors(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();

    if let Some(form_id) = submission_form_id(&path).map(str::to_string) {
        return submission_cors(state, &form_id, req, next).await;
    }

    global_cors(&state.config.cors, req, next).await
}

async fn submission_cors(state: AppState, form_id: &str, req: Request, next: Next) -> Response {
    let policy = match cached_policy(&state, form_id).await {
        Ok(policy) => policy,
        Err(err) => return err.into_response(),
    };

    let Some(mut policy) = policy else {
        tracing::debug!(form_id = %form_id, "Submission for unknown form");
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Form not found" })),
        )
            .into_response();
    };

    // A form whose owner configured no origins inherits the global policy.
    if policy.allowed_origins.is_empty() {
        let global = &state.config.cors;
        policy = FormCorsPolicy {
            allowed_origins: global.allowed_origins.clone(),
            allowed_methods: global.allowed_methods.clone(),
            allow_credentials: global.allow_credentials,
        };
    }

    let origin = req
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    // Requests without an Origin header are same-origin or non-browser
    // clients; CORS does not apply to them.
    let Some(origin) = origin else {
        if req.method() == Method::OPTIONS {
            return StatusCode::NO_CONTENT.into_response();
        }
        return next.run(req).await;
    };

    if !policy.allows_origin(&origin) {
        tracing::warn!(form_id = %form_id, origin = %origin, "Origin not allowed for form");
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "Origin not allowed" })),
        )
            .into_response();
    }

    if req.method() == Method::OPTIONS {
        let mut response = StatusCode::NO_CONTENT.into_response();
        apply_allow_headers(
            response.headers_mut(),
            &origin,
            &policy.allowed_methods,
            policy.allow_credentials,
        );
        insert_static(response.headers_mut(), header::ACCESS_CONTROL_MAX_AGE, PREFLIGHT_MAX_AGE);
        return response;
    }

    let mut response = next.run(req).await;
    apply_allow_headers(
        response.headers_mut(),
        &origin,
        &policy.allowed_methods,
        policy.allow_credentials,
    );
    response
}

async fn global_cors(config: &CorsConfig, req: Request, next: Next) -> Response {
    let origin = req
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let Some(origin) = origin else {
        return next.run(req).await;
    };

    let allowed = config
        .allowed_origins
        .iter()
        .any(|o| o == "*" || o == &origin);
    if !allowed {
        // Outside submission routes the browser enforces the missing
        // headers; the request itself proceeds.
        return next.run(req).await;
    }

    if req.method() == Method::OPTIONS {
        let mut response = StatusCode::NO_CONTENT.into_response();
        apply_allow_headers(
            response.headers_mut(),
            &origin,
            &config.allowed_methods,
            config.allow_credentials,
        );
        insert_static(response.headers_mut(), header::ACCESS_CONTROL_MAX_AGE, PREFLIGHT_MAX_AGE);
        return response;
    }

    let mut response = next.run(req).await;
    apply_allow_headers(
        response.headers_mut(),
        &origin,
        &config.allowed_methods,
        config.allow_credentials,
    );
    response
}

async fn cached_policy(
    state: &AppState,
    form_id: &str,
) -> Result<Option<FormCorsPolicy>, crate::errors::AppError> {
    if let Some(cached) = state.cors_cache.get(form_id) {
        return Ok(cached);
    }
    let policy = state.forms.cors_policy(form_id).await?;
    state.cors_cache.put(form_id, policy.clone());
    Ok(policy)
}

fn apply_allow_headers(
    headers: &mut HeaderMap,
    origin: &str,
    methods: &[String],
    credentials: bool,
) {
    if let Ok(value) = HeaderValue::from_str(origin) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
    }
    if let Ok(value) = HeaderValue::from_str(&methods.join(", ")) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, value);
    }
    insert_static(
        headers,
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        "Content-Type, X-CSRF-Token",
    );
    if credentials {
        insert_static(headers, header::ACCESS_CONTROL_ALLOW_CREDENTIALS, "true");
    }
    // Caches must not serve one origin's response to another.
    headers.append(header::VARY, HeaderValue::from_static("Origin"));
}

fn insert_static(headers: &mut HeaderMap, name: header::HeaderName, value: &'static str) {
    headers.insert(name, HeaderValue::from_static(value));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> FormCorsPolicy {
        FormCorsPolicy {
            allowed_origins: vec!["https://blog.example".to_string()],
            allowed_methods: vec!["POST".to_string(), "OPTIONS".to_string()],
            allow_credentials: false,
        }
    }

    #[test]
    fn cache_round_trip_and_invalidate() {
        let cache = CorsCache::new();
        assert!(cache.get("f1").is_none());

        cache.put("f1", Some(policy()));
        let cached = cache.get("f1").unwrap().unwrap();
        assert!(cached.allows_origin("https://blog.example"));

        cache.invalidate("f1");
        assert!(cache.get("f1").is_none());
    }

    #[test]
    fn cache_stores_negative_entries() {
        let cache = CorsCache::new();
        cache.put("missing", None);
        assert_eq!(cache.get("missing"), Some(None));
    }

    #[test]
    fn allow_headers_include_origin_and_vary() {
        let mut headers = HeaderMap::new();
        apply_allow_headers(
            &mut headers,
            "https://blog.example",
            &["POST".to_string()],
            true,
        );
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_ORIGIN.as_str()],
            "https://blog.example"
        );
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS.as_str()], "POST");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS.as_str()], "true");
        assert_eq!(headers[header::VARY.as_str()], "Origin");
    }
}
