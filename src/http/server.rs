//! Router assembly and the serve loop.
//!
//! # Responsibilities
//! - Own the shared application state handed to middleware and handlers
//! - Assemble the route table and the middleware chain in its fixed order
//! - Drive the listener with graceful shutdown and a drain grace period
//!
//! # Design Decisions
//! - The chain is built once at startup; per-request dispatch does no
//!   routing-table mutation and takes no global locks
//! - Layers are added innermost-first, so the last `.layer` call (recovery)
//!   is the outermost wrapper

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;

use crate::access::AccessManager;
use crate::config::AppConfig;
use crate::http::handlers::{api, auth, forms, pages};
use crate::lifecycle::Shutdown;
use crate::middleware::cors::CorsCache;
use crate::middleware::rate_limit::RateLimiter;
use crate::middleware::{context, cors, csrf, headers, logging, rate_limit, recovery};
use crate::services::{FormService, SubscriptionService, UserService};
use crate::session::{self, SessionManager};

/// How long in-flight requests get to drain after the shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Hard cap on request bodies, enforced before any handler buffers one.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Shared application state. Cloned per request by axum; every field is a
/// handle, so clones are cheap.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub sessions: Arc<SessionManager>,
    pub access: Arc<AccessManager>,
    pub limiter: Arc<RateLimiter>,
    pub cors_cache: Arc<CorsCache>,
    pub users: Arc<dyn UserService>,
    pub forms: Arc<dyn FormService>,
    pub subscriptions: Arc<dyn SubscriptionService>,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Wire up state from configuration and the domain services.
    pub fn new(
        config: AppConfig,
        users: Arc<dyn UserService>,
        forms: Arc<dyn FormService>,
        subscriptions: Arc<dyn SubscriptionService>,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        let is_development = config.app.is_development();
        Self {
            sessions: Arc::new(SessionManager::new(config.session.clone(), is_development)),
            access: Arc::new(AccessManager::from_config(&config.access)),
            limiter: Arc::new(RateLimiter::new(config.rate_limit.clone())),
            cors_cache: Arc::new(CorsCache::new()),
            config: Arc::new(config),
            users,
            forms,
            subscriptions,
            metrics,
        }
    }
}

/// Assemble the route table and wrap it in the middleware chain.
pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/", get(pages::home))
        .route("/login", get(pages::login_page).post(auth::login))
        .route("/signup", get(pages::signup_page).post(auth::signup))
        .route(
            "/reset-password",
            get(pages::reset_password_page).post(auth::reset_password),
        )
        .route("/logout", post(auth::logout))
        .route("/demo", get(pages::demo))
        .route("/dashboard", get(pages::dashboard))
        .route("/profile", get(pages::profile))
        .route("/settings", get(pages::settings))
        .route("/forms", get(pages::forms_index))
        .route("/admin", get(pages::admin))
        .route("/forms/{form_id}/submissions", post(forms::submit))
        .route("/api/v1/forms", get(api::list_forms))
        .route("/api/v1/validation/email", post(api::validate_email))
        .route("/api/v1/validation/password", post(api::validate_password))
        .route("/api/v1/subscriptions", post(api::subscribe))
        .route("/health", get(api::health))
        .route("/metrics", get(api::metrics));

    if state.config.app.is_development() {
        router = router
            .route("/debug/panic", get(api::debug_panic))
            .route("/debug/slow", get(api::debug_slow));
    }

    // Innermost first; the final layer (recovery) is outermost.
    router
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(from_fn_with_state(state.clone(), crate::access::enforce_access))
        .layer(from_fn_with_state(state.clone(), session::resolve_session))
        .layer(from_fn_with_state(
            state.clone(),
            rate_limit::enforce_rate_limit,
        ))
        .layer(from_fn_with_state(state.clone(), csrf::csrf_protect))
        .layer(from_fn_with_state(state.clone(), headers::security_headers))
        .layer(from_fn_with_state(state.clone(), cors::enforce_cors))
        .layer(axum::middleware::from_fn(logging::log_request))
        .layer(from_fn_with_state(state.clone(), context::request_context))
        .layer(from_fn_with_state(state.clone(), recovery::recover))
        .with_state(state)
}

/// Serve until the shutdown coordinator fires, then give in-flight
/// requests a bounded grace period.
pub async fn run(
    listener: TcpListener,
    state: AppState,
    shutdown: Arc<Shutdown>,
) -> std::io::Result<()> {
    let router = build_router(state);
    let mut rx = shutdown.subscribe();

    let serve = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = rx.recv().await;
    });

    // Watchdog: a request that refuses to drain must not hold the process
    // open forever.
    let mut watchdog_rx = shutdown.subscribe();
    tokio::select! {
        result = serve => result,
        _ = async {
            let _ = watchdog_rx.recv().await;
            tokio::time::sleep(SHUTDOWN_GRACE + Duration::from_secs(1)).await;
        } => {
            tracing::warn!(
                grace_secs = SHUTDOWN_GRACE.as_secs(),
                "Drain grace period expired, closing remaining connections"
            );
            Ok(())
        }
    }
}
