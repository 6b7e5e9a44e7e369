//! Security response headers.
//!
//! The fixed header set plus the composed Content-Security-Policy. The
//! `apply_security_headers` helper inserts only when absent, so responses
//! short-circuited by outer middleware (panics, deadline timeouts, CORS
//! rejections) still leave with the full set when recovery stamps them on
//! the way out.

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;

use crate::config::AppConfig;
use crate::http::server::AppState;

const X_XSS_PROTECTION: HeaderName = HeaderName::from_static("x-xss-protection");
const PERMISSIONS_POLICY: HeaderName = HeaderName::from_static("permissions-policy");

/// Insert the security header set into `headers`, leaving any header that
/// is already present untouched.
pub fn apply_security_headers(config: &AppConfig, headers: &mut HeaderMap) {
    let h = &config.security.headers;
    insert_if_absent(headers, header::X_CONTENT_TYPE_OPTIONS, "nosniff");
    insert_if_absent(headers, header::X_FRAME_OPTIONS, &h.x_frame_options);
    insert_if_absent(headers, X_XSS_PROTECTION, &h.x_xss_protection);
    insert_if_absent(headers, header::REFERRER_POLICY, &h.referrer_policy);
    insert_if_absent(headers, PERMISSIONS_POLICY, &h.permissions_policy);

    // HSTS is a no-op over plain HTTP and confuses local development.
    if config.app.scheme == "https" {
        insert_if_absent(
            headers,
            header::STRICT_TRANSPORT_SECURITY,
            &h.strict_transport_security,
        );
    }

    let csp = config.security.csp.compose(config.app.is_development());
    insert_if_absent(headers, header::CONTENT_SECURITY_POLICY, &csp);
}

fn insert_if_absent(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    if headers.contains_key(&name) {
        return;
    }
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(name, value);
    }
}

pub async fn security_headers(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    apply_security_headers(&state.config, response.headers_mut());
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_header_set_is_applied() {
        let config = AppConfig::default();
        let mut headers = HeaderMap::new();
        apply_security_headers(&config, &mut headers);

        assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS.as_str()], "nosniff");
        assert_eq!(headers[header::X_FRAME_OPTIONS.as_str()], "DENY");
        assert!(headers.contains_key(header::CONTENT_SECURITY_POLICY.as_str()));
        assert!(headers.contains_key("permissions-policy"));
        // Default config is http, so no HSTS.
        assert!(!headers.contains_key(header::STRICT_TRANSPORT_SECURITY.as_str()));
    }

    #[test]
    fn hsts_requires_https_scheme() {
        let mut config = AppConfig::default();
        config.app.scheme = "https".to_string();
        let mut headers = HeaderMap::new();
        apply_security_headers(&config, &mut headers);
        assert!(headers.contains_key(header::STRICT_TRANSPORT_SECURITY.as_str()));
    }

    #[test]
    fn existing_headers_are_preserved() {
        let config = AppConfig::default();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("SAMEORIGIN"),
        );
        apply_security_headers(&config, &mut headers);
        assert_eq!(headers[header::X_FRAME_OPTIONS.as_str()], "SAMEORIGIN");
    }

    #[test]
    fn csp_loosens_connect_src_in_development() {
        let config = AppConfig::default();
        let mut headers = HeaderMap::new();
        apply_security_headers(&config, &mut headers);
        let csp = headers[header::CONTENT_SECURITY_POLICY.as_str()]
            .to_str()
            .unwrap();
        assert!(csp.contains("ws: wss:"));
    }
}
