//! Access resolution and enforcement middleware.

use axum::extract::{Request, State};
use axum::http::{Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use serde_json::json;

use crate::access::rules::{default_rules, AccessLevel, AccessRule};
use crate::config::AccessConfig;
use crate::http::request::{is_html_client, submission_form_id};
use crate::http::server::AppState;
use crate::session::Principal;

/// Outcome of an access check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Admit,
    Redirect(String),
    Reject(StatusCode),
}

/// Classifies routes and decides admission. Immutable after startup;
/// reads take no lock.
pub struct AccessManager {
    rules: Vec<AccessRule>,
    default_level: AccessLevel,
}

impl AccessManager {
    /// Build from configuration: the default rule set plus any configured
    /// overrides. Config validation has already vetted the inputs.
    pub fn from_config(config: &AccessConfig) -> Self {
        let mut manager = Self {
            rules: default_rules(),
            default_level: AccessLevel::parse(&config.default_level)
                .unwrap_or(AccessLevel::Authenticated),
        };
        for rule in &config.rules {
            let methods = rule
                .methods
                .iter()
                .filter_map(|m| m.parse::<Method>().ok())
                .collect();
            manager.add_rule(
                AccessRule::new(
                    &rule.path,
                    AccessLevel::parse(&rule.level).unwrap_or(AccessLevel::Authenticated),
                )
                .with_methods(methods),
            );
        }
        manager
    }

    /// Append a rule. Only available before the manager is shared.
    pub fn add_rule(&mut self, rule: AccessRule) {
        self.rules.push(rule);
    }

    /// Required level for a path and method: the most specific matching
    /// rule wins, ties break toward the more restrictive level.
    pub fn required_access(&self, path: &str, method: &Method) -> AccessLevel {
        // Form submission intake is public by design; the per-form CORS
        // policy is the gate, not the session.
        if method == Method::POST && submission_form_id(path).is_some() {
            return AccessLevel::Public;
        }

        self.rules
            .iter()
            .filter(|rule| rule.applies_to_method(method))
            .filter_map(|rule| rule.match_specificity(path).map(|s| (s, rule.level)))
            .max()
            .map(|(_, level)| level)
            .unwrap_or(self.default_level)
    }

    pub fn is_public_path(&self, path: &str) -> bool {
        self.required_access(path, &Method::GET) == AccessLevel::Public
    }

    pub fn is_admin_path(&self, path: &str) -> bool {
        self.required_access(path, &Method::GET) == AccessLevel::Admin
    }

    /// Decide admission for a request.
    pub fn decide(
        &self,
        path: &str,
        method: &Method,
        principal: &Principal,
        html_client: bool,
    ) -> Decision {
        match self.required_access(path, method) {
            AccessLevel::Public => Decision::Admit,
            AccessLevel::Authenticated => {
                if principal.is_authenticated() {
                    Decision::Admit
                } else if html_client {
                    Decision::Redirect("/login".to_string())
                } else {
                    Decision::Reject(StatusCode::UNAUTHORIZED)
                }
            }
            AccessLevel::Admin => match principal {
                Principal::Anonymous if html_client => {
                    Decision::Redirect("/login".to_string())
                }
                Principal::Anonymous => Decision::Reject(StatusCode::UNAUTHORIZED),
                p if p.is_admin() => Decision::Admit,
                _ => Decision::Reject(StatusCode::FORBIDDEN),
            },
        }
    }
}

/// Enforcement middleware, the last stop before the dispatcher. The
/// principal was installed by the session resolver immediately upstream.
pub async fn enforce_access(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let principal = req
        .extensions()
        .get::<Principal>()
        .cloned()
        .unwrap_or(Principal::Anonymous);
    let html_client = is_html_client(req.headers(), req.uri().path());

    match state
        .access
        .decide(req.uri().path(), req.method(), &principal, html_client)
    {
        Decision::Admit => next.run(req).await,
        Decision::Redirect(location) => {
            tracing::debug!(
                path = %req.uri().path(),
                "Anonymous request to protected route, redirecting"
            );
            Redirect::to(&location).into_response()
        }
        Decision::Reject(status) => {
            let message = if status == StatusCode::FORBIDDEN {
                "Access denied"
            } else {
                "Authentication required"
            };
            tracing::debug!(
                path = %req.uri().path(),
                status = status.as_u16(),
                "Access rejected"
            );
            (status, Json(json!({ "error": message }))).into_response()
        }
    }
}
