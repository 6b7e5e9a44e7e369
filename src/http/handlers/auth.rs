//! Authentication handlers: login, signup, password reset, logout.
//!
//! Each accepts either a browser form post or a JSON body; the
//! content type picks the response shape: redirects and re-rendered
//! forms for browsers, JSON for API clients. Session establishment
//! rotates the CSRF token so a
//! token minted for the anonymous session never survives a login.

use std::collections::HashMap;

use axum::body::to_bytes;
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Json;
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde_json::json;

use crate::errors::AppError;
use crate::http::handlers::pages;
use crate::http::server::AppState;
use crate::middleware::csrf::{self, CsrfToken};
use crate::session::Role;

const MAX_BODY_BYTES: usize = 64 * 1024;

/// Field map from either a urlencoded form or a flat JSON object.
async fn read_fields(req: Request) -> Result<(HeaderMap, HashMap<String, String>), AppError> {
    let (parts, body) = req.into_parts();
    let bytes = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| AppError::Validation(format!("unreadable request body: {e}")))?;

    let content_type = parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let fields = if content_type.starts_with("application/json") {
        let value: serde_json::Value = serde_json::from_slice(&bytes)
            .map_err(|e| AppError::Validation(format!("invalid JSON body: {e}")))?;
        value
            .as_object()
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    } else {
        url::form_urlencoded::parse(&bytes)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    };

    Ok((parts.headers, fields))
}

fn is_form_request(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false)
}

fn required<'a>(fields: &'a HashMap<String, String>, name: &str) -> Result<&'a str, AppError> {
    fields
        .get(name)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Validation(format!("{name} is required")))
}

fn append_cookie(response: &mut Response, cookie: &Cookie<'_>) {
    if let Ok(value) = cookie.to_string().parse() {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
}

/// Attach the session cookie and a rotated CSRF token to a login response.
fn establish_session(state: &AppState, response: &mut Response, session_id: &str) {
    if let Some(cookie) = state.sessions.session_cookie(session_id) {
        append_cookie(response, &cookie);
    }
    if state.config.csrf.enabled {
        let token = csrf::mint_token();
        let cookie = csrf::csrf_cookie(
            &state.config.csrf,
            state.config.app.is_development(),
            &token,
        );
        append_cookie(response, &cookie);
    }
}

/// Browser form posts get their page back with an error banner; API
/// clients get the JSON error from `AppError`'s `IntoResponse`.
fn rerender(err: &AppError, page: Html<String>) -> Response {
    (err.status(), page).into_response()
}

fn user_agent(headers: &HeaderMap) -> String {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string()
}

pub async fn login(State(state): State<AppState>, req: Request) -> Result<Response, AppError> {
    let token = req.extensions().get::<CsrfToken>().cloned();
    let (headers, fields) = read_fields(req).await?;

    let outcome = match (required(&fields, "email"), required(&fields, "password")) {
        (Ok(email), Ok(password)) => state.users.authenticate(email, password).await,
        (Err(err), _) | (_, Err(err)) => Err(err),
    };
    let user = match outcome {
        Ok(user) => user,
        Err(err) if is_form_request(&headers) => {
            let page = pages::render_login(token.as_ref(), Some(&err.public_message()));
            return Ok(rerender(&err, page));
        }
        Err(err) => return Err(err),
    };

    let session_id = state
        .sessions
        .create(&user.id, user.role, &user_agent(&headers));

    tracing::info!(user_id = %user.id, "User logged in");

    let mut response = if is_form_request(&headers) {
        Redirect::to("/dashboard").into_response()
    } else {
        Json(json!({ "user": user })).into_response()
    };
    establish_session(&state, &mut response, &session_id);
    Ok(response)
}

pub async fn signup(State(state): State<AppState>, req: Request) -> Result<Response, AppError> {
    let token = req.extensions().get::<CsrfToken>().cloned();
    let (headers, fields) = read_fields(req).await?;

    let outcome = match (required(&fields, "email"), required(&fields, "password")) {
        (Ok(email), Ok(password)) => {
            let name = fields.get("name").map(String::as_str).unwrap_or("");
            state.users.signup(email, name, password).await
        }
        (Err(err), _) | (_, Err(err)) => Err(err),
    };
    let user = match outcome {
        Ok(user) => user,
        Err(err) if is_form_request(&headers) => {
            let page = pages::render_signup(token.as_ref(), Some(&err.public_message()));
            return Ok(rerender(&err, page));
        }
        Err(err) => return Err(err),
    };

    let session_id = state
        .sessions
        .create(&user.id, Role::User, &user_agent(&headers));

    tracing::info!(user_id = %user.id, "Account created");

    let mut response = if is_form_request(&headers) {
        Redirect::to("/dashboard").into_response()
    } else {
        (StatusCode::CREATED, Json(json!({ "user": user }))).into_response()
    };
    establish_session(&state, &mut response, &session_id);
    Ok(response)
}

/// Always answers the same way so the endpoint cannot be used to probe
/// which addresses have accounts.
pub async fn reset_password(
    State(_state): State<AppState>,
    req: Request,
) -> Result<Response, AppError> {
    let token = req.extensions().get::<CsrfToken>().cloned();
    let (headers, fields) = read_fields(req).await?;
    let email = match required(&fields, "email") {
        Ok(email) => email,
        Err(err) if is_form_request(&headers) => {
            let page = pages::render_reset_password(token.as_ref(), Some(&err.public_message()));
            return Ok(rerender(&err, page));
        }
        Err(err) => return Err(err),
    };

    tracing::info!(email = %email, "Password reset requested");

    if is_form_request(&headers) {
        Ok(Redirect::to("/login").into_response())
    } else {
        Ok(Json(json!({
            "message": "If that account exists, a reset link has been sent"
        }))
        .into_response())
    }
}

/// Idempotent: logging out without a live session still lands on /login
/// with cleared cookies.
pub async fn logout(State(state): State<AppState>, req: Request) -> Response {
    let jar = CookieJar::from_headers(req.headers());
    if let Some(cookie) = jar.get(state.sessions.cookie_name()) {
        state.sessions.delete(cookie.value());
        tracing::info!("Session terminated");
    }

    let mut response = if req
        .headers()
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("application/json"))
        .unwrap_or(false)
    {
        Json(json!({ "status": "logged out" })).into_response()
    } else {
        Redirect::to("/login").into_response()
    };

    append_cookie(&mut response, &state.sessions.removal_cookie());
    if state.config.csrf.enabled {
        append_cookie(&mut response, &csrf::expire_cookie(&state.config.csrf));
    }
    response
}
