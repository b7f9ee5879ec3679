use actix_web::dev::Server;
use actix_web::error::{JsonPayloadError, PathError};
use actix_web::middleware::DefaultHeaders;
use actix_web::{web, App, HttpRequest, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::{Role, SessionManager};
use crate::configuration::RateLimitSettings;
use crate::error::{AppError, ValidationError};
use crate::logger::LoggerMiddleware;
use crate::middleware::{JwtMiddleware, RateLimitMiddleware, RoleGuard};
use crate::routes::{
    change_password, get_current_user, health_check, list_active_users, list_sessions, login,
    logout, logout_all, logout_session, refresh, register,
};
use crate::security::{RateLimiterManager, SecurityHeaders};

/// Largest accepted JSON body
const JSON_PAYLOAD_LIMIT: usize = 16 * 1024;

pub fn run(
    listener: TcpListener,
    sessions: SessionManager,
    rate_limit: RateLimitSettings,
) -> Result<Server, std::io::Error> {
    let jwt_config = sessions.jwt_settings().clone();
    let sessions = web::Data::new(sessions);
    let login_limiter = Arc::new(RateLimiterManager::new(&rate_limit));

    let server = HttpServer::new(move || {
        let security_headers = SecurityHeaders::get_headers()
            .into_iter()
            .fold(DefaultHeaders::new(), |headers, header| headers.add(header));

        App::new()
            // Global middleware (last wrap runs first)
            .wrap(LoggerMiddleware)
            .wrap(security_headers)

            // Shared state
            .app_data(sessions.clone())
            .app_data(json_config())
            .app_data(path_config())

            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/auth")
                    .route("/register", web::post().to(register))
                    .service(
                        web::resource("/login")
                            .wrap(RateLimitMiddleware::new(login_limiter.clone()))
                            .route(web::post().to(login)),
                    )
                    .route("/refresh", web::post().to(refresh))
                    .route("/logout", web::post().to(logout))

                    // Protected routes (require JWT authentication)
                    .service(
                        web::scope("/me")
                            .wrap(JwtMiddleware::new(jwt_config.clone()))
                            .route("", web::get().to(get_current_user))
                            .route("/password", web::put().to(change_password)),
                    )
                    .service(
                        web::scope("/sessions")
                            .wrap(JwtMiddleware::new(jwt_config.clone()))
                            .route("", web::get().to(list_sessions))
                            .route("", web::delete().to(logout_all))
                            .route("/{session_id}", web::delete().to(logout_session)),
                    ),
            )
            .service(
                web::scope("/admin")
                    .wrap(RoleGuard::new(&[Role::Administrator]))
                    .wrap(JwtMiddleware::new(jwt_config.clone()))
                    .route("/sessions", web::get().to(list_active_users)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}

/// Malformed or incomplete JSON bodies become 400 validation errors
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(JSON_PAYLOAD_LIMIT)
        .error_handler(|err: JsonPayloadError, _req: &HttpRequest| {
            tracing::debug!("Rejected JSON body: {}", err);
            let reason = match &err {
                JsonPayloadError::Overflow { .. }
                | JsonPayloadError::OverflowKnownLength { .. } => "payload too large".to_string(),
                JsonPayloadError::ContentType => "expected application/json".to_string(),
                JsonPayloadError::Deserialize(e) => e.to_string(),
                _ => "unreadable body".to_string(),
            };
            AppError::from(ValidationError::MalformedBody(reason)).into()
        })
}

/// Unparseable path segments (e.g. a non-numeric session id) become 400s
fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err: PathError, req: &HttpRequest| {
        tracing::debug!(path = %req.path(), "Rejected path parameters: {}", err);
        let param = req
            .match_info()
            .iter()
            .map(|(name, _)| name)
            .next()
            .unwrap_or("path")
            .to_string();
        AppError::from(ValidationError::InvalidFormat(param)).into()
    })
}
