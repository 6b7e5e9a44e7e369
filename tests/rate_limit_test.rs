//! Rate limiting through the full pipeline.

mod common;

use common::{client, fetch_csrf, spawn_app_with, test_config, FORM_ID, FORM_ORIGIN};

#[tokio::test]
async fn auth_endpoint_is_limited_per_client() {
    let mut config = test_config();
    config.rate_limit.requests = 5;
    config.rate_limit.burst = 5;
    let app = spawn_app_with(config).await;

    let client = client();
    let token = fetch_csrf(&client, &app).await;

    // CSRF runs before the limiter, so every attempt must present a valid
    // token to reach accounting.
    for attempt in 0..5 {
        let response = client
            .post(app.url("/login"))
            .form(&[
                ("email", "demo@example.com"),
                ("password", "wrong-password"),
                ("_csrf", &token),
            ])
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 401, "attempt {attempt} should reach auth");
    }

    let response = client
        .post(app.url("/login"))
        .form(&[
            ("email", "demo@example.com"),
            ("password", "wrong-password"),
            ("_csrf", &token),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 429);
    let retry_after: u64 = response.headers()["retry-after"]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after >= 1);
    assert_eq!(
        response.text().await.unwrap(),
        "Rate limit exceeded: please try again later"
    );
}

#[tokio::test]
async fn safe_methods_bypass_the_limiter() {
    let mut config = test_config();
    config.rate_limit.requests = 2;
    config.rate_limit.burst = 2;
    let app = spawn_app_with(config).await;
    let client = client();

    for _ in 0..10 {
        let response = client.get(app.url("/")).send().await.unwrap();
        assert_eq!(response.status(), 200);
    }
}

#[tokio::test]
async fn submissions_are_limited_per_form_and_origin() {
    let mut config = test_config();
    config.rate_limit.requests = 3;
    config.rate_limit.burst = 3;
    let app = spawn_app_with(config).await;
    let client = client();
    let url = app.url(&format!("/forms/{FORM_ID}/submissions"));

    for _ in 0..3 {
        let response = client
            .post(&url)
            .header("Origin", FORM_ORIGIN)
            .json(&serde_json::json!({ "message": "hi" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201);
    }

    let response = client
        .post(&url)
        .header("Origin", FORM_ORIGIN)
        .json(&serde_json::json!({ "message": "hi" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 429);
}

#[tokio::test]
async fn disabled_limiter_admits_everything() {
    let mut config = test_config();
    config.rate_limit.enabled = false;
    let app = spawn_app_with(config).await;
    let client = client();
    let token = fetch_csrf(&client, &app).await;

    for _ in 0..30 {
        let response = client
            .post(app.url("/login"))
            .form(&[
                ("email", "demo@example.com"),
                ("password", "wrong-password"),
                ("_csrf", &token),
            ])
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 401);
    }
}
