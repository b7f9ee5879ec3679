/// JWT Claims structure
///
/// Represents the payload of an access token: subject, role and the
/// standard registered claims (RFC 7519).

use serde::{Deserialize, Serialize};

use crate::auth::role::Role;
use crate::error::AuthError;

/// JWT Claims for access tokens
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (numeric user ID as a string)
    pub sub: String,
    /// User role, canonical lowercase name
    pub role: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Issuer
    pub iss: String,
}

impl Claims {
    /// Create new claims for a user
    ///
    /// # Arguments
    /// * `user_id` - User's numeric id
    /// * `role` - User's role
    /// * `expiry_seconds` - Token lifetime in seconds from now
    /// * `issuer` - Issuer identifier
    pub fn new(user_id: i64, role: Role, expiry_seconds: i64, issuer: String) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: user_id.to_string(),
            role: role.as_str().to_string(),
            exp: now + expiry_seconds,
            iat: now,
            iss: issuer,
        }
    }

    /// Resolve the caller identity carried by these claims
    ///
    /// # Errors
    /// `TokenInvalid` if the subject is not numeric or the role is unknown
    pub fn identity(&self) -> Result<AuthenticatedUser, AuthError> {
        let user_id = self.sub.parse::<i64>().map_err(|_| AuthError::TokenInvalid)?;
        let role = self.role.parse::<Role>().map_err(|_| AuthError::TokenInvalid)?;
        Ok(AuthenticatedUser { user_id, role })
    }
}

/// Caller identity resolved from a verified access token.
///
/// Inserted into request extensions by the JWT middleware; handlers take
/// it as `web::ReqData<AuthenticatedUser>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: i64,
    pub role: Role,
}
