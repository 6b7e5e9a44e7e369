//! Login, signup, logout and CSRF behavior through the full pipeline.

mod common;

use common::{client, fetch_csrf, login, spawn_app, USER_EMAIL, USER_PASSWORD};

#[tokio::test]
async fn browser_login_flow_establishes_session() {
    let app = spawn_app().await;
    let client = client();
    login(&client, &app, USER_EMAIL, USER_PASSWORD).await;

    let response = client.get(app.url("/dashboard")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(app.state.sessions.len(), 1);
}

#[tokio::test]
async fn wrong_password_rerenders_the_login_form() {
    let app = spawn_app().await;
    let client = client();
    let token = fetch_csrf(&client, &app).await;

    let response = client
        .post(app.url("/login"))
        .form(&[
            ("email", USER_EMAIL),
            ("password", "not-the-password"),
            ("_csrf", &token),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
    let content_type = response.headers()["content-type"].to_str().unwrap().to_string();
    assert!(
        content_type.starts_with("text/html"),
        "browser form posts get a page back, got {content_type}"
    );
    let body = response.text().await.unwrap();
    assert!(body.contains("Invalid credentials"));
    assert!(body.contains(r#"action="/login""#), "the form is re-rendered");
    assert_eq!(app.state.sessions.len(), 0);
}

#[tokio::test]
async fn wrong_password_is_401_json_for_api_clients() {
    let app = spawn_app().await;
    let client = client();
    let token = fetch_csrf(&client, &app).await;

    let response = client
        .post(app.url("/login"))
        .header("X-CSRF-Token", &token)
        .json(&serde_json::json!({
            "email": USER_EMAIL,
            "password": "not-the-password",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Invalid credentials");
    assert_eq!(app.state.sessions.len(), 0);
}

#[tokio::test]
async fn duplicate_signup_rerenders_the_signup_form() {
    let app = spawn_app().await;
    let client = client();
    let token = fetch_csrf(&client, &app).await;

    let response = client
        .post(app.url("/signup"))
        .form(&[
            ("email", USER_EMAIL),
            ("password", "long-enough-password"),
            ("_csrf", &token),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);
    let body = response.text().await.unwrap();
    assert!(body.contains("email already registered"));
    assert!(body.contains(r#"action="/signup""#));
}

#[tokio::test]
async fn login_without_csrf_token_is_403_with_empty_body() {
    let app = spawn_app().await;
    let client = client();
    // Prime the CSRF cookie but withhold the token from the post.
    fetch_csrf(&client, &app).await;

    let response = client
        .post(app.url("/login"))
        .form(&[("email", USER_EMAIL), ("password", USER_PASSWORD)])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);
    assert!(response.text().await.unwrap().is_empty());
}

#[tokio::test]
async fn csrf_token_from_another_session_is_rejected() {
    let app = spawn_app().await;

    let victim = client();
    let stolen_token = fetch_csrf(&victim, &app).await;

    // The attacker has the victim's token but not the matching cookie.
    let attacker = client();
    let response = attacker
        .post(app.url("/login"))
        .form(&[
            ("email", USER_EMAIL),
            ("password", USER_PASSWORD),
            ("_csrf", &stolen_token),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);
}

#[tokio::test]
async fn json_login_uses_csrf_header() {
    let app = spawn_app().await;
    let client = client();
    let token = fetch_csrf(&client, &app).await;

    let response = client
        .post(app.url("/login"))
        .header("X-CSRF-Token", &token)
        .json(&serde_json::json!({
            "email": USER_EMAIL,
            "password": USER_PASSWORD,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["user"]["email"], USER_EMAIL);
}

#[tokio::test]
async fn signup_creates_account_and_session() {
    let app = spawn_app().await;
    let client = client();
    let token = fetch_csrf(&client, &app).await;

    let response = client
        .post(app.url("/signup"))
        .header("X-CSRF-Token", &token)
        .json(&serde_json::json!({
            "email": "new@example.com",
            "name": "New User",
            "password": "long-enough-password",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);

    // The fresh session admits the new user without another login.
    let response = client.get(app.url("/dashboard")).send().await.unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn signup_rejects_duplicate_and_weak_inputs() {
    let app = spawn_app().await;
    let client = client();
    let token = fetch_csrf(&client, &app).await;

    let response = client
        .post(app.url("/signup"))
        .header("X-CSRF-Token", &token)
        .json(&serde_json::json!({
            "email": USER_EMAIL,
            "password": "long-enough-password",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);

    let response = client
        .post(app.url("/signup"))
        .header("X-CSRF-Token", &token)
        .json(&serde_json::json!({
            "email": "short@example.com",
            "password": "short",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn logout_is_idempotent() {
    let app = spawn_app().await;
    let client = client();
    login(&client, &app, USER_EMAIL, USER_PASSWORD).await;

    let dashboard = client
        .get(app.url("/dashboard"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    let token = common::extract_csrf(&dashboard);

    let response = client
        .post(app.url("/logout"))
        .form(&[("_csrf", &token)])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 303);
    assert_eq!(response.headers()["location"], "/login");
    assert_eq!(app.state.sessions.len(), 0);

    // Second logout: no session, no cookie, still lands on /login.
    let token = fetch_csrf(&client, &app).await;
    let response = client
        .post(app.url("/logout"))
        .form(&[("_csrf", &token)])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 303);
    assert_eq!(response.headers()["location"], "/login");
}

#[tokio::test]
async fn two_logins_create_distinct_sessions() {
    let app = spawn_app().await;

    let first = client();
    let second = client();
    login(&first, &app, USER_EMAIL, USER_PASSWORD).await;
    login(&second, &app, USER_EMAIL, USER_PASSWORD).await;
    assert_eq!(app.state.sessions.len(), 2);

    assert_eq!(
        first.get(app.url("/dashboard")).send().await.unwrap().status(),
        200
    );
    assert_eq!(
        second.get(app.url("/dashboard")).send().await.unwrap().status(),
        200
    );
}

#[tokio::test]
async fn login_rotates_the_csrf_cookie() {
    let app = spawn_app().await;
    let client = client();
    let before = fetch_csrf(&client, &app).await;
    login(&client, &app, USER_EMAIL, USER_PASSWORD).await;

    let dashboard = client
        .get(app.url("/dashboard"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    let after = common::extract_csrf(&dashboard);
    assert_ne!(before, after, "CSRF token must rotate across login");
}
