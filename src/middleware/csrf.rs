//! CSRF protection: double-submit cookie with header or form-field echo.
//!
//! Safe methods receive a token (cookie plus request extension so pages
//! can embed it); unsafe methods must echo the cookie value through one of
//! the configured lookup sources. Comparison is constant-time.
//!
//! Skip rules, evaluated in order:
//! 1. static assets pass through untouched
//! 2. safe methods (GET/HEAD/OPTIONS) only issue a token
//! 3. form submission intake is cross-site by design; the per-form CORS
//!    policy is its gate, so it is exempt
//! 4. `/api/` requests carrying an `Authorization` header or the token
//!    header itself are exempt: custom headers do not survive a
//!    cross-site request without a passing CORS preflight
//! 5. validation helper endpoints (`/api/validation/`, `/api/v1/validation/`)
//!    are exempt
//!
//! The auth endpoints (`/login`, `/signup`, `/reset-password`) match none
//! of these and are therefore always validated.

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, Method};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar};

use crate::config::CsrfConfig;
use crate::errors::AppError;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::session::manager::parse_same_site;

/// Form bodies larger than this cannot be a legitimate login or submission
/// form and are not buffered for token extraction.
const MAX_FORM_BODY_BYTES: usize = 1024 * 1024;

/// The CSRF token for this request, installed into the extensions so page
/// handlers can embed it in rendered forms.
#[derive(Debug, Clone)]
pub struct CsrfToken(pub String);

/// One place a presented token may live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenSource {
    Header(String),
    Form(String),
}

/// Parse a `token_lookup` string (`header:X-CSRF-Token,form:_csrf`) into
/// ordered sources. Malformed entries are dropped; config validation
/// rejects lookups that parse to nothing.
pub fn parse_token_lookup(lookup: &str) -> Vec<TokenSource> {
    lookup
        .split(',')
        .filter_map(|entry| {
            let entry = entry.trim();
            let (kind, name) = entry.split_once(':')?;
            if name.is_empty() {
                return None;
            }
            match kind {
                "header" => Some(TokenSource::Header(name.to_string())),
                "form" => Some(TokenSource::Form(name.to_string())),
                _ => None,
            }
        })
        .collect()
}

/// Build the CSRF cookie. Unlike the session cookie it is readable by
/// scripts when `cookie_http_only` is off, which SPAs need to echo it.
pub fn csrf_cookie(config: &CsrfConfig, is_development: bool, value: &str) -> Cookie<'static> {
    let mut cookie = Cookie::new(config.cookie_name.clone(), value.to_string());
    cookie.set_path("/");
    cookie.set_http_only(config.cookie_http_only);
    cookie.set_secure(!is_development);
    cookie.set_same_site(parse_same_site(&config.cookie_same_site, is_development));
    cookie.set_max_age(time::Duration::seconds(config.cookie_max_age_secs as i64));
    cookie
}

/// Build an expired cookie that removes the CSRF cookie client-side. Used
/// when rotating the token across login and logout.
pub fn expire_cookie(config: &CsrfConfig) -> Cookie<'static> {
    let mut cookie = Cookie::new(config.cookie_name.clone(), "");
    cookie.set_path("/");
    cookie.set_max_age(time::Duration::ZERO);
    cookie
}

/// Mint a fresh CSRF token.
pub fn mint_token() -> String {
    crate::session::opaque_token()
}

fn is_static_asset(config: &CsrfConfig, path: &str) -> bool {
    config.static_prefixes.iter().any(|p| path.starts_with(p.as_str()))
        || config.static_extensions.iter().any(|e| path.ends_with(e.as_str()))
}

fn is_exempt_api(config: &CsrfConfig, path: &str, headers: &HeaderMap) -> bool {
    if path.starts_with("/api/validation/") || path.starts_with("/api/v1/validation/") {
        return true;
    }
    if !path.starts_with("/api/") {
        return false;
    }
    if headers.contains_key(header::AUTHORIZATION) {
        return true;
    }
    // Presenting the token header at all is enough here; a cross-site
    // request cannot attach it without passing a CORS preflight first.
    parse_token_lookup(&config.token_lookup)
        .iter()
        .any(|source| match source {
            TokenSource::Header(name) => headers
                .get(name.as_str())
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| !v.is_empty()),
            TokenSource::Form(_) => false,
        })
}

/// The Cookie header as presented, control characters scrubbed so the
/// failure log cannot be forged.
fn cookie_for_log(headers: &HeaderMap) -> String {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(crate::http::request::sanitize_for_log)
        .unwrap_or_default()
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

pub async fn csrf_protect(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let config = &state.config.csrf;
    if !config.enabled {
        return next.run(req).await;
    }

    let path = req.uri().path().to_string();
    if is_static_asset(config, &path) {
        return next.run(req).await;
    }

    let is_development = state.config.app.is_development();
    let jar = CookieJar::from_headers(req.headers());
    let cookie_token = jar.get(&config.cookie_name).map(|c| c.value().to_string());

    let safe = matches!(*req.method(), Method::GET | Method::HEAD | Method::OPTIONS);
    if safe {
        // Issue a token when the client has none yet; pages read it from
        // the extensions to embed in rendered forms.
        let (token, fresh) = match cookie_token {
            Some(token) => (token, false),
            None => (mint_token(), true),
        };
        req.extensions_mut().insert(CsrfToken(token.clone()));
        let mut response = next.run(req).await;
        if fresh {
            let cookie = csrf_cookie(config, is_development, &token);
            if let Ok(value) = cookie.to_string().parse() {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
        }
        return response;
    }

    if crate::http::request::submission_form_id(&path).is_some() {
        return next.run(req).await;
    }

    if is_exempt_api(config, &path, req.headers()) {
        return next.run(req).await;
    }

    let presented = match presented_token(config, &mut req).await {
        Ok(token) => token,
        Err(response) => return response,
    };

    let valid = match (&cookie_token, &presented) {
        (Some(expected), Some(given)) => constant_time_eq(expected, given),
        _ => false,
    };

    if !valid {
        metrics::record_csrf_rejected();
        if is_development {
            tracing::warn!(
                path = %path,
                cookie = %cookie_for_log(req.headers()),
                presented_len = presented.as_deref().map(str::len).unwrap_or(0),
                origin = req
                    .headers()
                    .get(header::ORIGIN)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or(""),
                content_type = req
                    .headers()
                    .get(header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or(""),
                "CSRF validation failed"
            );
        } else {
            tracing::warn!(path = %path, "CSRF validation failed");
        }
        return AppError::Csrf.into_response();
    }

    if let Some(token) = cookie_token {
        req.extensions_mut().insert(CsrfToken(token));
    }
    next.run(req).await
}

/// Extract the presented token from the configured sources, in order.
/// Form extraction buffers the body and restores it for the handler.
async fn presented_token(
    config: &CsrfConfig,
    req: &mut Request,
) -> Result<Option<String>, Response> {
    let sources = parse_token_lookup(&config.token_lookup);

    for source in &sources {
        if let TokenSource::Header(name) = source {
            if let Some(value) = req.headers().get(name.as_str()).and_then(|v| v.to_str().ok()) {
                if !value.is_empty() {
                    return Ok(Some(value.to_string()));
                }
            }
        }
    }

    let wants_form = sources.iter().any(|s| matches!(s, TokenSource::Form(_)));
    let is_form = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false);
    if !wants_form || !is_form {
        return Ok(None);
    }

    let (parts, body) = std::mem::take(req).into_parts();
    let bytes = match to_bytes(body, MAX_FORM_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(_) => {
            tracing::warn!(path = %parts.uri.path(), "Failed to buffer form body for CSRF check");
            return Err(AppError::Csrf.into_response());
        }
    };

    let mut token = None;
    for source in &sources {
        if let TokenSource::Form(field) = source {
            token = url::form_urlencoded::parse(&bytes)
                .find(|(name, _)| name == field.as_str())
                .map(|(_, value)| value.into_owned());
            if token.is_some() {
                break;
            }
        }
    }

    *req = Request::from_parts(parts, Body::from(bytes));
    Ok(token)
}
