/// Authentication module
///
/// Handles password hashing, JWT access tokens, opaque refresh tokens,
/// roles, and the session lifecycle built on top of them.

mod claims;
mod jwt;
mod password;
mod refresh_token;
mod role;
mod session;

pub use claims::{AuthenticatedUser, Claims};
pub use jwt::generate_access_token;
pub use jwt::validate_access_token;
pub use password::hash_password;
pub use password::verify_password;
pub use refresh_token::{generate_refresh_secret, hash_refresh_token, RefreshSecret};
pub use role::{Role, UnknownRole};
pub use session::{
    RegisteredUser, Registration, SessionManager, SessionSummary, TokenPair, UserProfile,
    UserSessions,
};
