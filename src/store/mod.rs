/// Persistence for users and refresh-token sessions
///
/// The session manager only sees the two traits below. `PgStore` is the
/// production backend; `InMemoryStore` backs tests and local runs.

mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::auth::Role;
use crate::error::AppError;

pub use memory::InMemoryStore;
pub use postgres::PgStore;

/// Stored user identity
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub name: String,
    /// Always lowercased
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// One refresh-token session. `token_hash` is the SHA-256 of the raw token.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct RefreshTokenRecord {
    pub id: i64,
    pub user_id: i64,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Rows removed by a purge run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub expired: u64,
    pub revoked: u64,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `AppError::Conflict` when the email is taken.
    async fn create(&self, user: NewUser) -> Result<User, AppError>;
    /// Case-insensitive lookup.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError>;
    async fn update_password(&self, id: i64, password_hash: &str) -> Result<(), AppError>;
    async fn list(&self) -> Result<Vec<User>, AppError>;
}

#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn create(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshTokenRecord, AppError>;

    /// Existing and not revoked. Expiry is left to the caller.
    async fn find_active_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, AppError>;

    /// Any state, revoked included.
    async fn find_by_hash(&self, token_hash: &str)
        -> Result<Option<RefreshTokenRecord>, AppError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<RefreshTokenRecord>, AppError>;

    /// Non-revoked sessions, newest first.
    async fn list_active_for_user(&self, user_id: i64)
        -> Result<Vec<RefreshTokenRecord>, AppError>;

    /// Replace hash and expiry of session `id` in place, but only while it
    /// still carries `current_hash` and is not revoked. `None` means the
    /// swap lost (already rotated, revoked or gone).
    async fn rotate(
        &self,
        id: i64,
        current_hash: &str,
        new_hash: &str,
        new_expires_at: DateTime<Utc>,
    ) -> Result<Option<RefreshTokenRecord>, AppError>;

    /// Idempotent.
    async fn revoke(&self, id: i64) -> Result<(), AppError>;

    /// Returns the number of sessions that were active.
    async fn revoke_all_for_user(&self, user_id: i64) -> Result<u64, AppError>;

    /// Delete expired sessions and sessions revoked more than
    /// `retention_days` ago.
    async fn purge_expired_and_stale_revoked(
        &self,
        retention_days: i64,
    ) -> Result<PurgeReport, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_expiry_boundary_counts_as_expired() {
        let now = Utc::now();
        let record = RefreshTokenRecord {
            id: 1,
            user_id: 1,
            token_hash: "h".to_string(),
            expires_at: now,
            revoked: false,
            revoked_at: None,
            created_at: now - Duration::days(1),
        };

        assert!(record.is_expired_at(now));
        assert!(!record.is_expired_at(now - Duration::seconds(1)));
    }
}
