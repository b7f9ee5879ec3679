/// Session management for the authenticated caller

use actix_web::{web, HttpResponse};
use serde::Serialize;

use crate::auth::{AuthenticatedUser, SessionManager, SessionSummary};
use crate::error::AppError;
use crate::routes::auth::{MessageResponse, RevokedResponse};

#[derive(Serialize)]
pub struct SessionListResponse {
    pub total: usize,
    pub sessions: Vec<SessionSummary>,
}

/// GET /auth/sessions
pub async fn list_sessions(
    user: web::ReqData<AuthenticatedUser>,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let list = sessions.list_sessions(user.user_id).await?;

    Ok(HttpResponse::Ok().json(SessionListResponse {
        total: list.len(),
        sessions: list,
    }))
}

/// DELETE /auth/sessions
///
/// Signs the caller out of every device.
pub async fn logout_all(
    user: web::ReqData<AuthenticatedUser>,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let revoked_count = sessions.logout_all(user.user_id).await?;

    Ok(HttpResponse::Ok().json(RevokedResponse {
        message: "All sessions signed out".to_string(),
        revoked_count,
    }))
}

/// DELETE /auth/sessions/{session_id}
///
/// # Errors
/// - 403: Session is missing or belongs to another user
pub async fn logout_session(
    user: web::ReqData<AuthenticatedUser>,
    path: web::Path<i64>,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let session_id = path.into_inner();
    sessions.logout_session(user.user_id, session_id).await?;

    Ok(HttpResponse::Ok().json(MessageResponse {
        message: format!("Session {} signed out", session_id),
    }))
}
