//! Rate limiting: token buckets keyed by request identifier.
//!
//! Identifiers, per route class:
//! - form submissions use `{form_id}:{origin}` so one noisy embedder
//!   cannot starve a form's other origins
//! - everything else (the auth endpoints included) keys on client IP
//!
//! Buckets refill continuously at `requests / window` and cap at `burst`.
//! State lives in a sharded map; stale buckets are evicted lazily on a
//! check cadence rather than by a dedicated task.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use dashmap::DashMap;

use crate::config::RateLimitConfig;
use crate::errors::AppError;
use crate::http::request::{submission_form_id, ClientIp};
use crate::http::server::AppState;
use crate::observability::metrics;

/// Run an eviction sweep every this many checks.
const EVICTION_CADENCE: u64 = 1024;

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
    last_seen: Instant,
}

/// Shared limiter state. Cheap to clone the Arc around; each check touches
/// a single shard.
pub struct RateLimiter {
    buckets: DashMap<String, Bucket>,
    config: RateLimitConfig,
    checks: AtomicU64,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            buckets: DashMap::new(),
            config,
            checks: AtomicU64::new(0),
        }
    }

    fn refill_rate(&self) -> f64 {
        self.config.requests as f64 / self.config.window_secs as f64
    }

    /// Whether this request bypasses accounting entirely.
    pub fn skips(&self, method: &str, path: &str) -> bool {
        !self.config.enabled
            || self.config.skip_methods.iter().any(|m| m == method)
            || self.config.skip_paths.iter().any(|p| path.starts_with(p.as_str()))
    }

    /// Take one token for `key`. On denial, returns the seconds until a
    /// token will be available again.
    pub fn check(&self, key: &str) -> Result<(), u64> {
        let now = Instant::now();
        let rate = self.refill_rate();
        let capacity = self.config.burst as f64;

        let mut bucket = self.buckets.entry(key.to_string()).or_insert_with(|| Bucket {
            tokens: capacity,
            last_refill: now,
            last_seen: now,
        });

        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * rate).min(capacity);
        bucket.last_refill = now;
        bucket.last_seen = now;

        let outcome = if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            Ok(())
        } else {
            let deficit = 1.0 - bucket.tokens;
            Err((deficit / rate).ceil().max(1.0) as u64)
        };
        drop(bucket);

        if self.checks.fetch_add(1, Ordering::Relaxed) % EVICTION_CADENCE == EVICTION_CADENCE - 1 {
            self.evict_stale(now);
        }
        outcome
    }

    /// Drop buckets idle long enough that they would have fully refilled.
    fn evict_stale(&self, now: Instant) {
        let ttl = Duration::from_secs((self.config.window_secs * 2).max(300));
        self.buckets
            .retain(|_, bucket| now.duration_since(bucket.last_seen) < ttl);
    }

    pub fn tracked_identifiers(&self) -> usize {
        self.buckets.len()
    }
}

/// Identifier for accounting: form submissions key on form and origin,
/// everything else on the client IP.
pub fn identifier(path: &str, client_ip: &str, origin: Option<&str>) -> String {
    if let Some(form_id) = submission_form_id(path) {
        return format!("{}:{}", form_id, origin.unwrap_or("unknown"));
    }
    client_ip.to_string()
}

pub async fn enforce_rate_limit(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path();
    if state.limiter.skips(req.method().as_str(), path) {
        return next.run(req).await;
    }

    let client_ip = req
        .extensions()
        .get::<ClientIp>()
        .map(|ip| ip.0.as_str())
        .unwrap_or("unknown");
    let origin = req
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok());
    let key = identifier(path, client_ip, origin);

    match state.limiter.check(&key) {
        Ok(()) => next.run(req).await,
        Err(retry_after_secs) => {
            metrics::record_rate_limited();
            tracing::warn!(
                identifier = %key,
                path = %path,
                retry_after_secs,
                "Rate limit exceeded"
            );
            AppError::RateLimit { retry_after_secs }.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(requests: u32, window_secs: u64, burst: u32) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            requests,
            window_secs,
            burst,
            ..RateLimitConfig::default()
        })
    }

    #[test]
    fn burst_is_honored_then_denied() {
        let limiter = limiter(10, 60, 10);
        for _ in 0..10 {
            assert!(limiter.check("ip").is_ok());
        }
        let retry_after = limiter.check("ip").unwrap_err();
        assert!(retry_after >= 1);
    }

    #[test]
    fn identifiers_are_isolated() {
        let limiter = limiter(1, 60, 1);
        assert!(limiter.check("a").is_ok());
        assert!(limiter.check("a").is_err());
        assert!(limiter.check("b").is_ok());
    }

    #[test]
    fn skip_rules() {
        let limiter = RateLimiter::new(RateLimitConfig::default());
        assert!(limiter.skips("GET", "/dashboard"));
        assert!(limiter.skips("POST", "/health"));
        assert!(limiter.skips("POST", "/assets/app.css"));
        assert!(!limiter.skips("POST", "/login"));

        let disabled = RateLimiter::new(RateLimitConfig {
            enabled: false,
            ..RateLimitConfig::default()
        });
        assert!(disabled.skips("POST", "/login"));
    }

    #[test]
    fn submission_identifier_uses_form_and_origin() {
        assert_eq!(
            identifier(
                "/forms/f1/submissions",
                "203.0.113.7",
                Some("https://blog.example")
            ),
            "f1:https://blog.example"
        );
        assert_eq!(
            identifier("/forms/f1/submissions", "203.0.113.7", None),
            "f1:unknown"
        );
        assert_eq!(identifier("/login", "203.0.113.7", None), "203.0.113.7");
    }

    #[test]
    fn eviction_drops_idle_buckets() {
        let limiter = limiter(10, 60, 10);
        assert!(limiter.check("stale").is_ok());
        assert_eq!(limiter.tracked_identifiers(), 1);
        // Not yet idle long enough.
        limiter.evict_stale(Instant::now());
        assert_eq!(limiter.tracked_identifiers(), 1);
    }

    #[test]
    fn refill_restores_tokens_over_time() {
        let limiter = limiter(60, 60, 1);
        assert!(limiter.check("ip").is_ok());
        assert!(limiter.check("ip").is_err());
        {
            let mut bucket = limiter.buckets.get_mut("ip").unwrap();
            bucket.last_refill = Instant::now() - Duration::from_secs(2);
        }
        // Two seconds at one token per second refills past a full token.
        assert!(limiter.check("ip").is_ok());
    }
}
