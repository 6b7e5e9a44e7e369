//! Session store and resolver middleware.
//!
//! Storage is an in-process map behind a reader-writer lock: resolves take
//! the read lock, login/logout take the write lock. A background sweeper
//! removes expired records. A shared store (Redis) could replace this
//! behind the same operations; cross-replica ordering is not required.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::config::SessionConfig;
use crate::http::server::AppState;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::session::{opaque_token, Principal, Role};

/// A live session owned by the manager.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub id: String,
    pub user_id: String,
    pub role: Role,
    pub created_at: SystemTime,
    pub expires_at: SystemTime,
    pub user_agent: String,
    pub last_seen_at: SystemTime,
}

/// Owns session records and the cookie discipline around them.
pub struct SessionManager {
    store: RwLock<HashMap<String, SessionRecord>>,
    config: SessionConfig,
    is_development: bool,
}

impl SessionManager {
    pub fn new(config: SessionConfig, is_development: bool) -> Self {
        Self {
            store: RwLock::new(HashMap::new()),
            config,
            is_development,
        }
    }

    /// Create a session for a freshly authenticated user and return its id.
    pub fn create(&self, user_id: &str, role: Role, user_agent: &str) -> String {
        let id = opaque_token();
        let now = SystemTime::now();
        let record = SessionRecord {
            id: id.clone(),
            user_id: user_id.to_string(),
            role,
            created_at: now,
            expires_at: now + self.config.max_age(),
            user_agent: user_agent.to_string(),
            last_seen_at: now,
        };

        let mut store = self.store.write().expect("session store lock poisoned");
        store.insert(id.clone(), record);
        id
    }

    /// Resolve a cookie value to a principal. Absent or expired sessions
    /// resolve to Anonymous; expired records are tombstoned on the way out.
    pub fn resolve(&self, cookie_value: &str) -> Principal {
        let now = SystemTime::now();

        let resolved = {
            let store = self.store.read().expect("session store lock poisoned");
            match store.get(cookie_value) {
                Some(record) if record.expires_at > now => Some(record.clone()),
                Some(_) => None, // expired, remove below
                None => return Principal::Anonymous,
            }
        };

        let Some(record) = resolved else {
            self.delete(cookie_value);
            return Principal::Anonymous;
        };

        let expires_at = if self.config.sliding {
            let extended = now + self.config.max_age();
            let mut store = self.store.write().expect("session store lock poisoned");
            if let Some(live) = store.get_mut(cookie_value) {
                live.expires_at = extended;
                live.last_seen_at = now;
            }
            extended
        } else {
            record.expires_at
        };

        Principal::Authenticated {
            user_id: record.user_id,
            role: record.role,
            session_id: record.id,
            issued_at: record.created_at,
            expires_at,
        }
    }

    /// Remove a session. Idempotent.
    pub fn delete(&self, session_id: &str) {
        let mut store = self.store.write().expect("session store lock poisoned");
        store.remove(session_id);
    }

    /// Remove all expired records, returning how many were dropped.
    pub fn sweep(&self) -> usize {
        let now = SystemTime::now();
        let mut store = self.store.write().expect("session store lock poisoned");
        let before = store.len();
        store.retain(|_, record| record.expires_at > now);
        before - store.len()
    }

    pub fn len(&self) -> usize {
        self.store.read().expect("session store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn cookie_name(&self) -> &str {
        &self.config.cookie_name
    }

    /// Build the session cookie for a live record. The max-age never
    /// exceeds the record's remaining lifetime; a missing or expired record
    /// yields no cookie at all.
    pub fn session_cookie(&self, session_id: &str) -> Option<Cookie<'static>> {
        let remaining = {
            let store = self.store.read().expect("session store lock poisoned");
            let record = store.get(session_id)?;
            record
                .expires_at
                .duration_since(SystemTime::now())
                .ok()?
        };

        let max_age_secs = remaining.as_secs_f64().ceil() as i64;
        let mut cookie = Cookie::new(self.config.cookie_name.clone(), session_id.to_string());
        cookie.set_path("/");
        cookie.set_http_only(self.config.http_only);
        cookie.set_secure(!self.is_development);
        cookie.set_same_site(parse_same_site(&self.config.same_site, self.is_development));
        cookie.set_max_age(time::Duration::seconds(max_age_secs));
        Some(cookie)
    }

    /// Build an expired cookie that removes the session cookie client-side.
    pub fn removal_cookie(&self) -> Cookie<'static> {
        let mut cookie = Cookie::new(self.config.cookie_name.clone(), "");
        cookie.set_path("/");
        cookie.set_http_only(self.config.http_only);
        cookie.set_secure(!self.is_development);
        cookie.set_max_age(time::Duration::ZERO);
        cookie
    }
}

/// Map a configured SameSite value to the cookie attribute. Unknown or
/// empty values fall back to Strict, or Lax in development where
/// cross-origin tooling is common.
pub fn parse_same_site(value: &str, is_development: bool) -> SameSite {
    match value {
        "Lax" => SameSite::Lax,
        "Strict" => SameSite::Strict,
        "None" => SameSite::None,
        _ if is_development => SameSite::Lax,
        _ => SameSite::Strict,
    }
}

/// Session resolver middleware: reads the cookie, resolves the principal
/// and installs it into the request extensions. Runs after rate limiting,
/// before access control.
pub async fn resolve_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let jar = CookieJar::from_headers(req.headers());
    let principal = jar
        .get(state.sessions.cookie_name())
        .map(|cookie| state.sessions.resolve(cookie.value()))
        .unwrap_or(Principal::Anonymous);

    metrics::set_active_sessions(state.sessions.len());
    req.extensions_mut().insert(principal);
    next.run(req).await
}

/// Spawn the background expiry sweeper. Runs until the shutdown broadcast
/// fires; this is the pipeline's only long-lived background task.
pub fn spawn_sweeper(manager: Arc<SessionManager>, shutdown: &Shutdown) {
    let mut rx = shutdown.subscribe();
    let period = manager.config.max_age().min(Duration::from_secs(300));

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = manager.sweep();
                    if removed > 0 {
                        tracing::debug!(removed, "Swept expired sessions");
                    }
                }
                _ = rx.recv() => {
                    tracing::debug!("Session sweeper stopping");
                    break;
                }
            }
        }
    });
}
