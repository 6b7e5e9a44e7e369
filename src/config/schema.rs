//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the form service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Application identity and environment.
    pub app: AppSettings,

    /// Server socket and timeout settings.
    pub server: ServerConfig,

    /// Session cookie and lifetime settings.
    pub session: SessionConfig,

    /// CSRF protection settings.
    pub csrf: CsrfConfig,

    /// Rate limiting settings.
    pub rate_limit: RateLimitConfig,

    /// Security header values and CSP directives.
    pub security: SecurityConfig,

    /// Global CORS policy (per-form policies override on submission routes).
    pub cors: CorsConfig,

    /// Access control rule overrides.
    pub access: AccessConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Application environment and identity.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppSettings {
    /// One of "development", "staging", "production".
    pub env: String,

    /// Listen host.
    pub host: String,

    /// Listen port.
    pub port: u16,

    /// Public scheme ("http" or "https").
    pub scheme: String,

    /// Per-request deadline in seconds.
    pub request_timeout_secs: u64,
}

impl AppSettings {
    pub fn is_development(&self) -> bool {
        self.env == "development"
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            env: "development".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8090,
            scheme: "http".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Server-level socket timeouts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Read timeout in seconds.
    pub read_timeout_secs: u64,

    /// Write timeout in seconds.
    pub write_timeout_secs: u64,

    /// Idle connection timeout in seconds.
    pub idle_timeout_secs: u64,

    /// Request header read timeout in seconds.
    pub read_header_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            read_timeout_secs: 15,
            write_timeout_secs: 15,
            idle_timeout_secs: 60,
            read_header_timeout_secs: 5,
        }
    }
}

/// Session cookie and lifetime settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Session cookie name.
    pub cookie_name: String,

    /// Session lifetime in seconds.
    pub max_age_secs: u64,

    /// SameSite attribute ("Lax", "Strict", "None").
    pub same_site: String,

    /// HttpOnly attribute on the session cookie.
    pub http_only: bool,

    /// Extend expiry on each authenticated request (sliding window).
    pub sliding: bool,
}

impl SessionConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "session_id".to_string(),
            max_age_secs: 86_400,
            same_site: "Lax".to_string(),
            http_only: true,
            sliding: false,
        }
    }
}

/// CSRF protection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CsrfConfig {
    /// Enable CSRF protection.
    pub enabled: bool,

    /// CSRF cookie name.
    pub cookie_name: String,

    /// Request-context key under which the token is exposed to handlers.
    pub context_key: String,

    /// Where to find the presented token, in priority order.
    /// Format: comma-separated `header:<name>` / `form:<field>` entries.
    pub token_lookup: String,

    /// CSRF cookie lifetime in seconds.
    pub cookie_max_age_secs: u64,

    /// HttpOnly attribute on the CSRF cookie.
    pub cookie_http_only: bool,

    /// SameSite attribute; empty falls back to Strict (Lax in development).
    pub cookie_same_site: String,

    /// Path prefixes treated as static assets (skipped entirely).
    pub static_prefixes: Vec<String>,

    /// File extensions treated as static assets (skipped entirely).
    pub static_extensions: Vec<String>,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cookie_name: "_csrf".to_string(),
            context_key: "csrf".to_string(),
            token_lookup: "header:X-CSRF-Token,form:_csrf".to_string(),
            cookie_max_age_secs: 86_400,
            cookie_http_only: true,
            cookie_same_site: String::new(),
            static_prefixes: vec![
                "/assets/".to_string(),
                "/css/".to_string(),
                "/js/".to_string(),
                "/images/".to_string(),
                "/fonts/".to_string(),
                "/static/".to_string(),
            ],
            static_extensions: vec![
                ".css".to_string(),
                ".js".to_string(),
                ".png".to_string(),
                ".jpg".to_string(),
                ".svg".to_string(),
                ".ico".to_string(),
                ".woff2".to_string(),
            ],
        }
    }
}

/// Rate limiting settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Requests allowed per window.
    pub requests: u32,

    /// Window length in seconds.
    pub window_secs: u64,

    /// Burst capacity.
    pub burst: u32,

    /// Path prefixes that bypass accounting.
    pub skip_paths: Vec<String>,

    /// Methods that bypass accounting.
    pub skip_methods: Vec<String>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests: 20,
            window_secs: 60,
            burst: 20,
            skip_paths: vec![
                "/assets/".to_string(),
                "/css/".to_string(),
                "/js/".to_string(),
                "/images/".to_string(),
                "/fonts/".to_string(),
                "/static/".to_string(),
                "/health".to_string(),
                "/metrics".to_string(),
            ],
            skip_methods: vec![
                "GET".to_string(),
                "HEAD".to_string(),
                "OPTIONS".to_string(),
            ],
        }
    }
}

/// Security header values.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SecurityConfig {
    pub headers: HeaderConfig,
    pub csp: CspConfig,
}

/// Values for the fixed security response headers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HeaderConfig {
    pub x_frame_options: String,
    pub x_xss_protection: String,
    pub referrer_policy: String,
    pub strict_transport_security: String,
    pub permissions_policy: String,
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            x_frame_options: "DENY".to_string(),
            x_xss_protection: "1; mode=block".to_string(),
            referrer_policy: "strict-origin-when-cross-origin".to_string(),
            strict_transport_security: "max-age=31536000; includeSubDomains".to_string(),
            permissions_policy: "geolocation=(), microphone=(), camera=()".to_string(),
        }
    }
}

/// Content-Security-Policy directives, composed per environment.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CspConfig {
    pub default_src: String,
    pub script_src: String,
    pub style_src: String,
    pub img_src: String,
    pub connect_src: String,
}

impl CspConfig {
    /// Compose the policy string. Development additionally allows websocket
    /// connections for live-reload tooling.
    pub fn compose(&self, is_development: bool) -> String {
        let connect = if is_development {
            format!("{} ws: wss:", self.connect_src)
        } else {
            self.connect_src.clone()
        };
        format!(
            "default-src {}; script-src {}; style-src {}; img-src {}; connect-src {}",
            self.default_src, self.script_src, self.style_src, self.img_src, connect
        )
    }
}

impl Default for CspConfig {
    fn default() -> Self {
        Self {
            default_src: "'self'".to_string(),
            script_src: "'self'".to_string(),
            style_src: "'self' 'unsafe-inline'".to_string(),
            img_src: "'self' data:".to_string(),
            connect_src: "'self'".to_string(),
        }
    }
}

/// Global CORS policy, used outside form-submission routes and as the
/// fallback when a form has no policy of its own.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            allowed_methods: vec!["GET".to_string(), "POST".to_string()],
            allow_credentials: false,
        }
    }
}

/// Access control overrides layered on top of the default rule set.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Access level for paths no rule matches:
    /// "public", "authenticated" or "admin".
    pub default_level: String,

    /// Extra rules appended to the defaults.
    pub rules: Vec<AccessRuleConfig>,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            default_level: "authenticated".to_string(),
            rules: Vec::new(),
        }
    }
}

/// A single configured access rule.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccessRuleConfig {
    /// Exact path, or prefix pattern ending in `/*`.
    pub path: String,

    /// "public", "authenticated" or "admin".
    pub level: String,

    /// Methods the rule applies to; empty means all.
    #[serde(default)]
    pub methods: Vec<String>,
}

/// Observability settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the in-process Prometheus endpoint at /metrics.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = AppConfig::default();
        assert_eq!(config.app.env, "development");
        assert_eq!(config.session.cookie_name, "session_id");
        assert_eq!(config.csrf.cookie_name, "_csrf");
        assert!(!config.session.sliding);
        assert!(config.rate_limit.skip_methods.contains(&"GET".to_string()));
    }

    #[test]
    fn csp_compose_adds_websockets_in_development() {
        let csp = CspConfig::default();
        assert!(csp.compose(true).contains("ws:"));
        assert!(!csp.compose(false).contains("ws:"));
    }

    #[test]
    fn parses_partial_toml() {
        let config: AppConfig = toml::from_str(
            r#"
            [app]
            env = "production"
            port = 9000

            [rate_limit]
            requests = 10
            window_secs = 10
            burst = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.app.env, "production");
        assert_eq!(config.app.port, 9000);
        assert_eq!(config.rate_limit.requests, 10);
        // Untouched sections fall back to defaults.
        assert_eq!(config.session.max_age_secs, 86_400);
    }
}
