/// Authentication Routes
///
/// Registration, login, refresh-token rotation, logout, and the caller's
/// own profile and password.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{AuthenticatedUser, Registration, SessionManager};
use crate::error::{AppError, ValidationError};

pub const REFRESH_TOKEN_HEADER: &str = "X-Refresh-Token";

/// User registration request
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<String>,
}

/// User login request
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Body for refresh and logout; the token may come in a header instead
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokedResponse {
    pub message: String,
    pub revoked_count: u64,
}

/// POST /auth/register
///
/// Creates the user (role defaults to `student`) and opens a first session.
///
/// # Errors
/// - 400: Invalid name, email, password or role
/// - 409: Email already registered (case-insensitive)
pub async fn register(
    form: web::Json<RegisterRequest>,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let form = form.into_inner();
    let registered = sessions
        .register(Registration {
            name: form.name,
            email: form.email,
            password: form.password,
            role: form.role,
        })
        .await?;

    Ok(HttpResponse::Created().json(registered))
}

/// POST /auth/login
///
/// # Errors
/// - 400: Malformed email or empty password
/// - 401: Unknown email or wrong password (same response for both)
/// - 429: Too many attempts from this client (rate limit middleware)
pub async fn login(
    form: web::Json<LoginRequest>,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    if form.password.is_empty() {
        return Err(ValidationError::EmptyField("password".to_string()).into());
    }

    let tokens = sessions.login(&form.email, &form.password).await?;
    Ok(HttpResponse::Ok().json(tokens))
}

/// POST /auth/refresh
///
/// Rotates the presented refresh token. The old one stops working.
///
/// # Errors
/// - 400: No refresh token in body or `X-Refresh-Token`
/// - 401: Unknown, revoked, expired or already rotated token
pub async fn refresh(
    req: HttpRequest,
    body: Option<web::Json<RefreshTokenRequest>>,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let token = presented_refresh_token(&req, body)?;
    let tokens = sessions.refresh(&token).await?;
    Ok(HttpResponse::Ok().json(tokens))
}

/// POST /auth/logout
///
/// Revokes the session behind the refresh token. Succeeds for unknown or
/// already revoked tokens.
pub async fn logout(
    req: HttpRequest,
    body: Option<web::Json<RefreshTokenRequest>>,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let token = presented_refresh_token(&req, body)?;
    sessions.logout(&token).await?;

    Ok(HttpResponse::Ok().json(MessageResponse {
        message: "Logged out".to_string(),
    }))
}

/// GET /auth/me
pub async fn get_current_user(
    user: web::ReqData<AuthenticatedUser>,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let profile = sessions.current_user(user.user_id).await?;
    Ok(HttpResponse::Ok().json(profile))
}

/// PUT /auth/me/password
///
/// Changes the password and signs the user out everywhere.
///
/// # Errors
/// - 400: New password breaks policy or equals the current one
/// - 401: Current password is wrong
pub async fn change_password(
    user: web::ReqData<AuthenticatedUser>,
    form: web::Json<ChangePasswordRequest>,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let revoked_count = sessions
        .change_password(user.user_id, &form.current_password, &form.new_password)
        .await?;

    Ok(HttpResponse::Ok().json(RevokedResponse {
        message: "Password changed; all sessions signed out".to_string(),
        revoked_count,
    }))
}

/// Refresh token from the JSON body, else from `X-Refresh-Token`
fn presented_refresh_token(
    req: &HttpRequest,
    body: Option<web::Json<RefreshTokenRequest>>,
) -> Result<String, AppError> {
    let from_body = body
        .and_then(|b| b.into_inner().refresh_token)
        .filter(|t| !t.trim().is_empty());

    let from_header = || {
        req.headers()
            .get(REFRESH_TOKEN_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    };

    from_body
        .or_else(from_header)
        .ok_or_else(|| ValidationError::MissingField("refreshToken".to_string()).into())
}
