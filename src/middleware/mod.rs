/// Middleware module
///
/// Custom middleware for authentication, authorization and rate limiting.

mod jwt_middleware;
mod rate_limit;
mod role_guard;

pub use jwt_middleware::JwtMiddleware;
pub use rate_limit::RateLimitMiddleware;
pub use role_guard::{authorize, RoleGuard};
