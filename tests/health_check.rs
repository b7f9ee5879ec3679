//! Integration tests for the health check and response headers

use std::net::TcpListener;
use std::sync::Arc;

use campus_auth::auth::SessionManager;
use campus_auth::configuration::{JwtSettings, RateLimitSettings};
use campus_auth::startup::run;
use campus_auth::store::InMemoryStore;

fn spawn_app() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let store = Arc::new(InMemoryStore::new());
    let jwt = JwtSettings {
        secret: "health-check-secret-at-least-32-characters".to_string(),
        access_token_expiry: 900,
        refresh_token_expiry: 604_800,
        issuer: "campus-auth-test".to_string(),
    };
    let sessions = SessionManager::new(store.clone(), store, jwt);
    let server =
        run(listener, sessions, RateLimitSettings::default()).expect("Failed to create server");

    let _ = tokio::spawn(async move {
        let _ = server.await;
    });

    format!("http://127.0.0.1:{}", port)
}

#[tokio::test]
async fn health_check_works() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/health_check", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    assert_eq!(Some(0), response.content_length());
}

#[tokio::test]
async fn responses_carry_security_headers() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/health_check", addr))
        .send()
        .await
        .expect("Failed to execute request");

    let headers = response.headers();
    assert_eq!(headers["x-frame-options"], "DENY");
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert!(headers.contains_key("content-security-policy"));
    assert!(headers.contains_key("permissions-policy"));
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let addr = spawn_app();
    let client = reqwest::Client::new();

    let generated = client
        .get(&format!("{}/health_check", addr))
        .send()
        .await
        .expect("Failed to execute request");
    let id = generated.headers()["x-request-id"].to_str().unwrap();
    assert!(uuid::Uuid::parse_str(id).is_ok());

    let echoed = client
        .get(&format!("{}/health_check", addr))
        .header("X-Request-ID", "trace-abc-123")
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(echoed.headers()["x-request-id"], "trace-abc-123");
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let addr = spawn_app();

    let response = reqwest::Client::new()
        .get(&format!("{}/does-not-exist", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(404, response.status().as_u16());
}
