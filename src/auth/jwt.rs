/// JWT Token Generation and Validation
///
/// Access tokens are HS256-signed and short-lived. Expiry is checked with
/// zero leeway.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::auth::claims::{AuthenticatedUser, Claims};
use crate::auth::role::Role;
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};

/// Generate a new access token for a user
///
/// # Arguments
/// * `user_id` - User's numeric id
/// * `role` - User's role, embedded in the claims
/// * `config` - JWT configuration settings
///
/// # Errors
/// Returns error if token generation fails
pub fn generate_access_token(
    user_id: i64,
    role: Role,
    config: &JwtSettings,
) -> Result<String, AppError> {
    let claims = Claims::new(user_id, role, config.access_token_expiry, config.issuer.clone());
    encode_claims(&claims, config)
}

pub(crate) fn encode_claims(claims: &Claims, config: &JwtSettings) -> Result<String, AppError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
}

/// Validate an access token and resolve the caller identity
///
/// # Errors
/// * `TokenExpired` once `exp` has passed
/// * `TokenInvalid` for bad signature, wrong issuer, malformed token or
///   unusable claims
pub fn validate_access_token(
    token: &str,
    config: &JwtSettings,
) -> Result<AuthenticatedUser, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.set_issuer(&[&config.issuer]);

    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => {
            tracing::debug!("JWT validation error: {}", e);
            AuthError::TokenInvalid
        }
    })?;

    claims.identity()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn get_test_config() -> JwtSettings {
        JwtSettings {
            secret: "test-secret-key-at-least-32-characters-long".to_string(),
            access_token_expiry: 900,
            refresh_token_expiry: 604800,
            issuer: "test".to_string(),
        }
    }

    #[test]
    fn test_generate_and_validate_token() {
        let config = get_test_config();

        let token = generate_access_token(12, Role::Instructor, &config)
            .expect("Failed to generate token");
        let identity = validate_access_token(&token, &config).expect("Failed to validate token");

        assert_eq!(identity.user_id, 12);
        assert_eq!(identity.role, Role::Instructor);
    }

    #[test]
    fn test_invalid_token() {
        let config = get_test_config();
        let result = validate_access_token("invalid.token.here", &config);

        assert_eq!(result, Err(AuthError::TokenInvalid));
    }

    #[test]
    fn test_tampered_token() {
        let config = get_test_config();

        let token = generate_access_token(1, Role::Student, &config)
            .expect("Failed to generate token");

        let tampered = format!("{}X", token);
        let result = validate_access_token(&tampered, &config);

        assert_eq!(result, Err(AuthError::TokenInvalid));
    }

    #[test]
    fn test_wrong_secret() {
        let config = get_test_config();
        let token = generate_access_token(1, Role::Student, &config)
            .expect("Failed to generate token");

        let mut other = get_test_config();
        other.secret = "another-secret-key-at-least-32-characters".to_string();

        assert_eq!(validate_access_token(&token, &other), Err(AuthError::TokenInvalid));
    }

    #[test]
    fn test_wrong_issuer() {
        let mut config = get_test_config();

        let token = generate_access_token(1, Role::Student, &config)
            .expect("Failed to generate token");

        config.issuer = "wrong-issuer".to_string();
        let result = validate_access_token(&token, &config);

        assert_eq!(result, Err(AuthError::TokenInvalid));
    }

    #[test]
    fn test_expired_token_is_rejected_without_leeway() {
        let config = get_test_config();
        let claims = Claims::new(1, Role::Student, -1, config.issuer.clone());
        let token = encode_claims(&claims, &config).expect("Failed to encode claims");

        assert_eq!(validate_access_token(&token, &config), Err(AuthError::TokenExpired));
    }

    #[test]
    fn test_unknown_role_is_invalid() {
        let config = get_test_config();
        let mut claims = Claims::new(1, Role::Student, 60, config.issuer.clone());
        claims.role = "overlord".to_string();
        let token = encode_claims(&claims, &config).expect("Failed to encode claims");

        assert_eq!(validate_access_token(&token, &config), Err(AuthError::TokenInvalid));
    }
}
