/// Refresh Token Secrets
///
/// Refresh tokens are:
/// - Cryptographically secure random 88-character alphanumeric strings
///   (over 512 bits of entropy)
/// - Hashed with SHA-256 before storage (plaintext never stored)
/// - Rotated in place on every refresh

use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use sha2::{Digest, Sha256};

/// log2(62) * 88 > 512
const REFRESH_TOKEN_LENGTH: usize = 88;

/// A freshly generated refresh token and its storage hash.
///
/// `raw` goes to the client exactly once; only `hash` is persisted.
pub struct RefreshSecret {
    pub raw: String,
    pub hash: String,
}

impl std::fmt::Debug for RefreshSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshSecret")
            .field("raw", &"<redacted>")
            .field("hash", &"<redacted>")
            .finish()
    }
}

/// Generate a new cryptographically secure refresh token
pub fn generate_refresh_secret() -> RefreshSecret {
    let raw: String = thread_rng()
        .sample_iter(&Alphanumeric)
        .take(REFRESH_TOKEN_LENGTH)
        .map(char::from)
        .collect();
    let hash = hash_refresh_token(&raw);

    RefreshSecret { raw, hash }
}

/// Hash a refresh token using SHA-256 (hex)
///
/// Deterministic, so it doubles as the lookup key.
pub fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}
