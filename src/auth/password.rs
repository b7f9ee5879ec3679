/// Password Hashing and Verification
///
/// bcrypt with a fixed cost. Strength rules live in `validators`.

use bcrypt::{hash, verify};

use crate::error::AppError;

/// bcrypt work factor
pub const PASSWORD_HASH_COST: u32 = 10;

/// Hash a password using bcrypt
///
/// The salt is random, so the same input never hashes to the same output
/// twice.
///
/// # Errors
/// Returns error if bcrypt fails (e.g. input over bcrypt's limits)
pub fn hash_password(password: &str) -> Result<String, AppError> {
    hash(password, PASSWORD_HASH_COST)
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against its hash
///
/// A malformed stored hash is a failed verification, not an error.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match verify(password, hash) {
        Ok(valid) => valid,
        Err(e) => {
            tracing::warn!("Stored password hash could not be parsed: {}", e);
            false
        }
    }
}
