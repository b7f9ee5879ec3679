/// Administrator-only routes. `RoleGuard` sits in front of this scope.

use actix_web::{web, HttpResponse};
use serde::Serialize;

use crate::auth::{AuthenticatedUser, SessionManager, UserSessions};
use crate::error::AppError;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveUsersResponse {
    pub total_users: usize,
    pub users_with_sessions: usize,
    pub users: Vec<UserSessions>,
}

/// GET /admin/sessions
pub async fn list_active_users(
    admin: web::ReqData<AuthenticatedUser>,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let users = sessions.list_active_users().await?;
    let users_with_sessions = users.iter().filter(|u| u.active_sessions > 0).count();

    tracing::info!(
        admin_id = admin.user_id,
        total_users = users.len(),
        users_with_sessions,
        "Active session listing served"
    );

    Ok(HttpResponse::Ok().json(ActiveUsersResponse {
        total_users: users.len(),
        users_with_sessions,
        users,
    }))
}
