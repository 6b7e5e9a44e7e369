//! Shared utilities for the integration tests: a server running the full
//! pipeline on an ephemeral port, plus login and CSRF helpers.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use formgate::config::{AccessRuleConfig, AppConfig};
use formgate::http::server::AppState;
use formgate::http::build_router;
use formgate::services::{
    FormCorsPolicy, MemoryFormStore, MemorySubscriptionStore, MemoryUserStore,
};
use formgate::session::Role;

pub const USER_EMAIL: &str = "demo@example.com";
pub const USER_PASSWORD: &str = "demo-password";
pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "admin-password";
pub const FORM_ID: &str = "demo";
pub const FORM_ORIGIN: &str = "https://blog.example";

pub struct TestApp {
    pub addr: SocketAddr,
    pub state: AppState,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Development-mode configuration used by most tests. The debug rule keeps
/// the panic route reachable without a session.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.app.env = "development".to_string();
    config.access.rules.push(AccessRuleConfig {
        path: "/debug/*".to_string(),
        level: "public".to_string(),
        methods: vec![],
    });
    config
}

/// Start the full pipeline on an ephemeral port with seeded services.
pub async fn spawn_app_with(config: AppConfig) -> TestApp {
    let users = Arc::new(
        MemoryUserStore::new()
            .with_user(USER_EMAIL, "Demo User", USER_PASSWORD, Role::User)
            .with_user(ADMIN_EMAIL, "Admin", ADMIN_PASSWORD, Role::Admin),
    );
    let forms = Arc::new(MemoryFormStore::new().with_form(
        FORM_ID,
        Some(FormCorsPolicy {
            allowed_origins: vec![FORM_ORIGIN.to_string()],
            allowed_methods: vec!["POST".to_string(), "OPTIONS".to_string()],
            allow_credentials: false,
        }),
    ));
    let subscriptions = Arc::new(MemorySubscriptionStore::new());

    let state = AppState::new(config, users, forms, subscriptions, None);
    let router = build_router(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    TestApp { addr, state }
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(test_config()).await
}

/// A client with its own cookie jar and no redirect following, so tests
/// can assert on 303 responses directly.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .cookie_store(true)
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

/// Pull the CSRF token out of a rendered form's hidden input.
pub fn extract_csrf(html: &str) -> String {
    let marker = r#"name="_csrf" value=""#;
    let start = html.find(marker).expect("no CSRF field in page") + marker.len();
    html[start..]
        .split('"')
        .next()
        .expect("unterminated CSRF field")
        .to_string()
}

/// Fetch the login page and return the embedded CSRF token. The client's
/// jar picks up the matching cookie as a side effect.
pub async fn fetch_csrf(client: &reqwest::Client, app: &TestApp) -> String {
    let body = client
        .get(app.url("/login"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    extract_csrf(&body)
}

/// Log in through the browser flow and assert the redirect to /dashboard.
pub async fn login(client: &reqwest::Client, app: &TestApp, email: &str, password: &str) {
    let token = fetch_csrf(client, app).await;
    let response = client
        .post(app.url("/login"))
        .form(&[("email", email), ("password", password), ("_csrf", &token)])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 303, "login should redirect");
    assert_eq!(response.headers()["location"], "/dashboard");
}
