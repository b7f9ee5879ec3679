use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

use super::{NewUser, PurgeReport, RefreshTokenRecord, RefreshTokenStore, User, UserStore};
use crate::error::{AppError, DatabaseError};

const USER_COLUMNS: &str = "id, name, email, password_hash, role, created_at";
const TOKEN_COLUMNS: &str = "id, user_id, token_hash, expires_at, revoked, revoked_at, created_at";

/// Postgres-backed store (schema in `migrations/`)
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    name: String,
    email: String,
    password_hash: String,
    role: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row.role.parse().map_err(|e| {
            AppError::Internal(format!("User {} has an unusable role: {}", row.id, e))
        })?;

        Ok(User {
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            role,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create(&self, user: NewUser) -> Result<User, AppError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (name, email, password_hash, role, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(&user.name)
        .bind(user.email.to_lowercase())
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Database(DatabaseError::UniqueConstraintViolation(_)) => {
                AppError::Conflict("Email already registered".to_string())
            }
            other => other,
        })?;

        User::try_from(row)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE lower(email) = lower($1)",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, UserRow>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("User".to_string()));
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<User>, AppError> {
        sqlx::query_as::<_, UserRow>(&format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS))
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(User::try_from)
            .collect()
    }
}

#[async_trait]
impl RefreshTokenStore for PgStore {
    async fn create(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshTokenRecord, AppError> {
        let record = sqlx::query_as::<_, RefreshTokenRecord>(&format!(
            r#"
            INSERT INTO refresh_tokens (user_id, token_hash, expires_at, revoked, created_at)
            VALUES ($1, $2, $3, false, $4)
            RETURNING {}
            "#,
            TOKEN_COLUMNS
        ))
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    async fn find_active_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, AppError> {
        let record = sqlx::query_as::<_, RefreshTokenRecord>(&format!(
            "SELECT {} FROM refresh_tokens WHERE token_hash = $1 AND revoked = false",
            TOKEN_COLUMNS
        ))
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn find_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, AppError> {
        let record = sqlx::query_as::<_, RefreshTokenRecord>(&format!(
            "SELECT {} FROM refresh_tokens WHERE token_hash = $1",
            TOKEN_COLUMNS
        ))
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<RefreshTokenRecord>, AppError> {
        let record = sqlx::query_as::<_, RefreshTokenRecord>(&format!(
            "SELECT {} FROM refresh_tokens WHERE id = $1",
            TOKEN_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn list_active_for_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<RefreshTokenRecord>, AppError> {
        let records = sqlx::query_as::<_, RefreshTokenRecord>(&format!(
            r#"
            SELECT {} FROM refresh_tokens
            WHERE user_id = $1 AND revoked = false
            ORDER BY created_at DESC, id DESC
            "#,
            TOKEN_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn rotate(
        &self,
        id: i64,
        current_hash: &str,
        new_hash: &str,
        new_expires_at: DateTime<Utc>,
    ) -> Result<Option<RefreshTokenRecord>, AppError> {
        // Single conditional UPDATE: the row only changes if nobody rotated
        // or revoked it since it was read.
        let record = sqlx::query_as::<_, RefreshTokenRecord>(&format!(
            r#"
            UPDATE refresh_tokens
            SET token_hash = $1, expires_at = $2
            WHERE id = $3 AND token_hash = $4 AND revoked = false
            RETURNING {}
            "#,
            TOKEN_COLUMNS
        ))
        .bind(new_hash)
        .bind(new_expires_at)
        .bind(id)
        .bind(current_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn revoke(&self, id: i64) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked = true, revoked_at = COALESCE(revoked_at, $1)
            WHERE id = $2
            "#,
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn revoke_all_for_user(&self, user_id: i64) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET revoked = true, revoked_at = $1
            WHERE user_id = $2 AND revoked = false
            "#,
        )
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn purge_expired_and_stale_revoked(
        &self,
        retention_days: i64,
    ) -> Result<PurgeReport, AppError> {
        let now = Utc::now();
        let cutoff = now - Duration::days(retention_days);

        let expired = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?
            .rows_affected();

        let revoked = sqlx::query(
            r#"
            DELETE FROM refresh_tokens
            WHERE revoked = true AND COALESCE(revoked_at, created_at) <= $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(PurgeReport { expired, revoked })
    }
}
