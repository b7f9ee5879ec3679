use std::net::TcpListener;
use std::sync::Arc;

use campus_auth::auth::{Claims, Role, SessionManager};
use campus_auth::configuration::{JwtSettings, RateLimitSettings};
use campus_auth::startup::run;
use campus_auth::store::InMemoryStore;
use campus_auth::telemetry::try_init_telemetry;
use serde_json::{json, Value};

pub struct TestApp {
    pub address: String,
    pub jwt: JwtSettings,
    pub client: reqwest::Client,
}

fn test_jwt_settings() -> JwtSettings {
    JwtSettings {
        secret: "integration-secret-key-at-least-32-characters".to_string(),
        access_token_expiry: 900,
        refresh_token_expiry: 604_800,
        issuer: "campus-auth-test".to_string(),
    }
}

async fn spawn_app() -> TestApp {
    spawn_app_with_rate_limit(RateLimitSettings {
        login_max_requests: 1_000,
        login_window_secs: 900,
    })
    .await
}

async fn spawn_app_with_rate_limit(rate_limit: RateLimitSettings) -> TestApp {
    try_init_telemetry();

    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let store = Arc::new(InMemoryStore::new());
    let jwt = test_jwt_settings();
    let sessions = SessionManager::new(store.clone(), store, jwt.clone());

    let server = run(listener, sessions, rate_limit).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address,
        jwt,
        client: reqwest::Client::new(),
    }
}

impl TestApp {
    async fn post_json(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(&format!("{}{}", self.address, path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    async fn register(&self, name: &str, email: &str, password: &str) -> reqwest::Response {
        self.post_json(
            "/auth/register",
            &json!({ "name": name, "email": email, "password": password }),
        )
        .await
    }

    async fn register_ana(&self) -> Value {
        let response = self.register("Ana Silva", "ana@x.com", "Senha1234").await;
        assert_eq!(201, response.status().as_u16());
        response.json().await.expect("Failed to parse response")
    }

    async fn login(&self, email: &str, password: &str) -> reqwest::Response {
        self.post_json("/auth/login", &json!({ "email": email, "password": password }))
            .await
    }

    async fn refresh(&self, refresh_token: &str) -> reqwest::Response {
        self.post_json("/auth/refresh", &json!({ "refreshToken": refresh_token }))
            .await
    }

    async fn get_authorized(&self, path: &str, access_token: &str) -> reqwest::Response {
        self.client
            .get(&format!("{}{}", self.address, path))
            .bearer_auth(access_token)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    async fn delete_authorized(&self, path: &str, access_token: &str) -> reqwest::Response {
        self.client
            .delete(&format!("{}{}", self.address, path))
            .bearer_auth(access_token)
            .send()
            .await
            .expect("Failed to execute request.")
    }
}

fn token(body: &Value, field: &str) -> String {
    body[field]
        .as_str()
        .unwrap_or_else(|| panic!("missing {} in {}", field, body))
        .to_string()
}

async fn error_code(response: reqwest::Response) -> String {
    let body: Value = response.json().await.expect("Failed to parse error body");
    body["code"].as_str().unwrap_or_default().to_string()
}

// --- Registration ---

#[tokio::test]
async fn register_returns_201_with_student_role_and_no_password() {
    let app = spawn_app().await;

    let body = app.register_ana().await;

    assert_eq!(body["user"]["name"], "Ana Silva");
    assert_eq!(body["user"]["email"], "ana@x.com");
    assert_eq!(body["user"]["role"], "student");
    assert!(body["user"].get("password").is_none());
    assert!(body["user"].get("passwordHash").is_none());
    assert!(body.get("accessToken").is_some());
    assert!(body.get("refreshToken").is_some());
    assert_eq!(body["tokenType"], "Bearer");
    assert_eq!(body["expiresIn"], 900);
}

#[tokio::test]
async fn register_returns_409_for_duplicate_email_in_any_case() {
    let app = spawn_app().await;
    app.register_ana().await;

    for email in ["ana@x.com", "ANA@X.COM"] {
        let response = app.register("Ana Silva", email, "Senha1234").await;
        assert_eq!(409, response.status().as_u16(), "email {}", email);
        assert_eq!(error_code(response).await, "CONFLICT");
    }
}

#[tokio::test]
async fn register_returns_400_for_invalid_data() {
    let app = spawn_app().await;
    let test_cases = vec![
        (
            json!({"name": "Ana Silva", "email": "not-an-email", "password": "Senha1234"}),
            "bad email",
        ),
        (json!({"name": "Al", "email": "al@x.com", "password": "Senha1234"}), "short name"),
        (json!({"name": "Ana Silva", "email": "ana@x.com", "password": "short"}), "short password"),
        (
            json!({
                "name": "Ana Silva",
                "email": "ana@x.com",
                "password": "Senha1234",
                "role": "janitor"
            }),
            "unknown role",
        ),
        (json!({"email": "ana@x.com", "password": "Senha1234"}), "missing name"),
        (json!({}), "empty body"),
    ];

    for (body, description) in test_cases {
        let response = app.post_json("/auth/register", &body).await;
        assert_eq!(
            400,
            response.status().as_u16(),
            "The API did not fail with 400 Bad Request for {}.",
            description
        );
        assert_eq!(error_code(response).await, "VALIDATION_ERROR", "{}", description);
    }
}

#[tokio::test]
async fn register_rejects_malformed_json() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(&format!("{}/auth/register", app.address))
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(400, response.status().as_u16());
    assert_eq!(error_code(response).await, "VALIDATION_ERROR");
}

// --- Login ---

#[tokio::test]
async fn login_returns_token_pair() {
    let app = spawn_app().await;
    app.register_ana().await;

    let response = app.login("Ana@X.com", "Senha1234").await;

    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert!(body.get("accessToken").is_some());
    assert!(body.get("refreshToken").is_some());
    assert_eq!(body["tokenType"], "Bearer");
}

#[tokio::test]
async fn login_failures_share_one_generic_response() {
    let app = spawn_app().await;
    app.register_ana().await;

    let wrong_password = app.login("ana@x.com", "WrongPass99").await;
    let unknown_email = app.login("nobody@x.com", "Senha1234").await;

    assert_eq!(401, wrong_password.status().as_u16());
    assert_eq!(401, unknown_email.status().as_u16());

    let wrong_password: Value = wrong_password.json().await.unwrap();
    let unknown_email: Value = unknown_email.json().await.unwrap();
    assert_eq!(wrong_password["code"], "INVALID_CREDENTIALS");
    assert_eq!(wrong_password["code"], unknown_email["code"]);
    assert_eq!(wrong_password["message"], unknown_email["message"]);
}

#[tokio::test]
async fn login_is_rate_limited_per_client() {
    let app = spawn_app_with_rate_limit(RateLimitSettings {
        login_max_requests: 3,
        login_window_secs: 900,
    })
    .await;

    for _ in 0..3 {
        let response = app.login("nobody@x.com", "Senha1234").await;
        assert_eq!(401, response.status().as_u16());
    }

    let response = app.login("nobody@x.com", "Senha1234").await;
    assert_eq!(429, response.status().as_u16());
    assert_eq!(error_code(response).await, "RATE_LIMITED");

    // Other endpoints are not throttled
    let response = app.register("Ana Silva", "ana@x.com", "Senha1234").await;
    assert_eq!(201, response.status().as_u16());
}

#[tokio::test]
async fn login_rate_limit_ignores_forwarded_headers() {
    let app = spawn_app_with_rate_limit(RateLimitSettings {
        login_max_requests: 3,
        login_window_secs: 900,
    })
    .await;

    let mut statuses = Vec::new();
    for i in 0..4 {
        let response = app
            .client
            .post(&format!("{}/auth/login", app.address))
            .header("X-Forwarded-For", format!("10.0.0.{}", i))
            .header("Forwarded", format!("for=10.0.1.{}", i))
            .json(&json!({ "email": "nobody@x.com", "password": "Senha1234" }))
            .send()
            .await
            .expect("Failed to execute request.");
        statuses.push(response.status().as_u16());

        if i == 3 {
            assert!(response.headers().contains_key("x-request-id"));
            assert_eq!(error_code(response).await, "RATE_LIMITED");
        }
    }

    assert_eq!(statuses, vec![401, 401, 401, 429]);
}

// --- Refresh & rotation ---

#[tokio::test]
async fn refresh_rotates_the_token() {
    let app = spawn_app().await;
    let registered = app.register_ana().await;
    let token_a = token(&registered, "refreshToken");

    let response = app.refresh(&token_a).await;
    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    let token_b = token(&body, "refreshToken");
    assert_ne!(token_a, token_b);

    let replay = app.refresh(&token_a).await;
    assert_eq!(401, replay.status().as_u16());
    assert_eq!(error_code(replay).await, "INVALID_REFRESH_TOKEN");

    assert_eq!(200, app.refresh(&token_b).await.status().as_u16());
}

#[tokio::test]
async fn refresh_accepts_token_in_header() {
    let app = spawn_app().await;
    let registered = app.register_ana().await;

    let response = app
        .client
        .post(&format!("{}/auth/refresh", app.address))
        .header("X-Refresh-Token", token(&registered, "refreshToken"))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(200, response.status().as_u16());
}

#[tokio::test]
async fn refresh_without_token_returns_400() {
    let app = spawn_app().await;

    let response = app.post_json("/auth/refresh", &json!({})).await;

    assert_eq!(400, response.status().as_u16());
}

#[tokio::test]
async fn refresh_with_unknown_token_returns_401() {
    let app = spawn_app().await;

    let response = app.refresh("never-issued").await;

    assert_eq!(401, response.status().as_u16());
    assert_eq!(error_code(response).await, "INVALID_REFRESH_TOKEN");
}

// --- Logout ---

#[tokio::test]
async fn logout_is_idempotent_and_kills_the_session() {
    let app = spawn_app().await;
    let registered = app.register_ana().await;
    let refresh_token = token(&registered, "refreshToken");
    let body = json!({ "refreshToken": refresh_token });

    assert_eq!(200, app.post_json("/auth/logout", &body).await.status().as_u16());
    assert_eq!(200, app.post_json("/auth/logout", &body).await.status().as_u16());

    let response = app.refresh(&refresh_token).await;
    assert_eq!(401, response.status().as_u16());
}

#[tokio::test]
async fn logout_all_revokes_every_session() {
    let app = spawn_app().await;
    let registered = app.register_ana().await;
    let access_token = token(&registered, "accessToken");

    let mut refresh_tokens = vec![token(&registered, "refreshToken")];
    for _ in 0..2 {
        let body: Value = app.login("ana@x.com", "Senha1234").await.json().await.unwrap();
        refresh_tokens.push(token(&body, "refreshToken"));
    }

    let response = app.delete_authorized("/auth/sessions", &access_token).await;
    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["revokedCount"], 3);

    for refresh_token in refresh_tokens {
        assert_eq!(401, app.refresh(&refresh_token).await.status().as_u16());
    }
}

// --- Sessions ---

#[tokio::test]
async fn list_sessions_shows_active_sessions() {
    let app = spawn_app().await;
    let registered = app.register_ana().await;
    app.login("ana@x.com", "Senha1234").await;

    let response = app
        .get_authorized("/auth/sessions", &token(&registered, "accessToken"))
        .await;

    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["total"], 2);
    assert_eq!(body["sessions"][0]["active"], true);
    assert!(body["sessions"][0].get("expiresAt").is_some());
}

#[tokio::test]
async fn logout_session_only_for_owner() {
    let app = spawn_app().await;
    let ana = app.register_ana().await;
    let bruno: Value = app
        .register("Bruno Lima", "bruno@x.com", "Senha1234")
        .await
        .json()
        .await
        .unwrap();
    let ana_access = token(&ana, "accessToken");
    let bruno_access = token(&bruno, "accessToken");

    let sessions: Value = app
        .get_authorized("/auth/sessions", &ana_access)
        .await
        .json()
        .await
        .unwrap();
    let session_id = sessions["sessions"][0]["id"].as_i64().unwrap();
    let path = format!("/auth/sessions/{}", session_id);

    let denied = app.delete_authorized(&path, &bruno_access).await;
    assert_eq!(403, denied.status().as_u16());
    assert_eq!(error_code(denied).await, "FORBIDDEN");

    let missing = app.delete_authorized("/auth/sessions/999999", &bruno_access).await;
    assert_eq!(403, missing.status().as_u16());

    let allowed = app.delete_authorized(&path, &ana_access).await;
    assert_eq!(200, allowed.status().as_u16());
    assert_eq!(401, app.refresh(&token(&ana, "refreshToken")).await.status().as_u16());
}

#[tokio::test]
async fn logout_session_rejects_non_numeric_id() {
    let app = spawn_app().await;
    let registered = app.register_ana().await;
    let access = token(&registered, "accessToken");

    let response = app.delete_authorized("/auth/sessions/abc", &access).await;

    assert_eq!(400, response.status().as_u16());
    assert!(response.headers().contains_key("x-request-id"));
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert!(body["message"].as_str().unwrap().contains("session_id"));

    // The session is untouched
    let sessions: Value = app
        .get_authorized("/auth/sessions", &access)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(sessions["total"], 1);
}

// --- Authorization gate ---

#[tokio::test]
async fn protected_routes_require_a_token() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(&format!("{}/auth/me", app.address))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(401, response.status().as_u16());
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(error_code(response).await, "MISSING_TOKEN");
}

#[tokio::test]
async fn invalid_token_returns_401() {
    let app = spawn_app().await;

    let response = app.get_authorized("/auth/me", "not.a.jwt").await;

    assert_eq!(401, response.status().as_u16());
    assert_eq!(error_code(response).await, "TOKEN_INVALID");
}

#[tokio::test]
async fn expired_token_returns_401() {
    let app = spawn_app().await;
    let claims = Claims::new(1, Role::Student, -60, app.jwt.issuer.clone());
    let expired = jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(app.jwt.secret.as_bytes()),
    )
    .unwrap();

    let response = app.get_authorized("/auth/me", &expired).await;

    assert_eq!(401, response.status().as_u16());
    assert_eq!(error_code(response).await, "TOKEN_EXPIRED");
}

#[tokio::test]
async fn me_returns_the_caller() {
    let app = spawn_app().await;
    let registered = app.register_ana().await;

    let response = app
        .get_authorized("/auth/me", &token(&registered, "accessToken"))
        .await;

    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["email"], "ana@x.com");
    assert_eq!(body["role"], "student");
    assert!(body.get("passwordHash").is_none());
}

#[tokio::test]
async fn admin_routes_reject_students() {
    let app = spawn_app().await;
    let registered = app.register_ana().await;

    let response = app
        .get_authorized("/admin/sessions", &token(&registered, "accessToken"))
        .await;

    assert_eq!(403, response.status().as_u16());
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(error_code(response).await, "FORBIDDEN");
}

#[tokio::test]
async fn admin_lists_active_users() {
    let app = spawn_app().await;
    app.register_ana().await;
    let admin: Value = app
        .post_json(
            "/auth/register",
            &json!({
                "name": "Carla Admin",
                "email": "carla@x.com",
                "password": "Senha1234",
                "role": "administrator"
            }),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(admin["user"]["role"], "administrator");

    let response = app
        .get_authorized("/admin/sessions", &token(&admin, "accessToken"))
        .await;

    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["totalUsers"], 2);
    assert_eq!(body["usersWithSessions"], 2);

    let ana = body["users"]
        .as_array()
        .unwrap()
        .iter()
        .find(|u| u["user"]["email"] == "ana@x.com")
        .expect("ana missing from listing");
    assert_eq!(ana["activeSessions"], 1);
    let ana_sessions = ana["sessions"].as_array().unwrap();
    assert_eq!(ana_sessions.len(), 1);
    assert_eq!(ana_sessions[0]["active"], true);
    assert!(ana_sessions[0]["daysRemaining"].as_i64().unwrap() >= 6);
}

// --- Password change ---

#[tokio::test]
async fn change_password_signs_out_everywhere() {
    let app = spawn_app().await;
    let registered = app.register_ana().await;

    let response = app
        .client
        .put(&format!("{}/auth/me/password", app.address))
        .bearer_auth(token(&registered, "accessToken"))
        .json(&json!({ "currentPassword": "Senha1234", "newPassword": "NovaSenha99" }))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["revokedCount"], 1);

    assert_eq!(401, app.refresh(&token(&registered, "refreshToken")).await.status().as_u16());
    assert_eq!(401, app.login("ana@x.com", "Senha1234").await.status().as_u16());
    assert_eq!(200, app.login("ana@x.com", "NovaSenha99").await.status().as_u16());
}

#[tokio::test]
async fn change_password_rejects_wrong_current_password() {
    let app = spawn_app().await;
    let registered = app.register_ana().await;

    let response = app
        .client
        .put(&format!("{}/auth/me/password", app.address))
        .bearer_auth(token(&registered, "accessToken"))
        .json(&json!({ "currentPassword": "NotMyPass1", "newPassword": "NovaSenha99" }))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(401, response.status().as_u16());
    assert_eq!(error_code(response).await, "INVALID_CREDENTIALS");
}
