/// Session Manager
///
/// Composes the password hasher, token issuer and stores into the
/// register / login / refresh / logout operations.
///
/// A session is one refresh-token record:
/// `ACTIVE -> ROTATED (same id) -> ... -> REVOKED`, or it lapses to
/// `EXPIRED`. Every operation returns `Result<_, AppError>`; raw passwords
/// and raw refresh tokens never reach a log line.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use lazy_static::lazy_static;
use serde::Serialize;

use crate::auth::jwt::generate_access_token;
use crate::auth::password::{hash_password, verify_password, PASSWORD_HASH_COST};
use crate::auth::refresh_token::{generate_refresh_secret, hash_refresh_token};
use crate::auth::role::Role;
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError, ValidationError};
use crate::store::{NewUser, RefreshTokenRecord, RefreshTokenStore, User, UserStore};
use crate::validators::{is_valid_email, is_valid_name, is_valid_password, parse_role};

lazy_static! {
    // Verified against when the email is unknown, so both login failure
    // paths cost one bcrypt verification.
    static ref TIMING_GUARD_HASH: String =
        bcrypt::hash("timing-guard-password", PASSWORD_HASH_COST).unwrap_or_default();
}

/// Public view of a user (no password hash)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            created_at: user.created_at,
        }
    }
}

/// Access token plus the raw refresh token, handed to the client once
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Result of a successful registration
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredUser {
    pub user: UserProfile,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

/// Registration input, straight from the request body
#[derive(Debug, Clone)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Option<String>,
}

/// One of the caller's sessions
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub active: bool,
    pub days_remaining: i64,
}

impl SessionSummary {
    fn from_record(record: &RefreshTokenRecord, now: DateTime<Utc>) -> Self {
        Self {
            id: record.id,
            created_at: record.created_at,
            expires_at: record.expires_at,
            active: !record.is_expired_at(now),
            days_remaining: (record.expires_at - now).num_days().max(0),
        }
    }
}

/// A user together with their non-revoked sessions (admin view)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSessions {
    pub user: UserProfile,
    pub active_sessions: usize,
    pub last_session_at: Option<DateTime<Utc>>,
    pub sessions: Vec<SessionSummary>,
}

#[derive(Clone)]
pub struct SessionManager {
    users: Arc<dyn UserStore>,
    tokens: Arc<dyn RefreshTokenStore>,
    jwt: Arc<JwtSettings>,
}

impl SessionManager {
    pub fn new(
        users: Arc<dyn UserStore>,
        tokens: Arc<dyn RefreshTokenStore>,
        jwt: JwtSettings,
    ) -> Self {
        Self {
            users,
            tokens,
            jwt: Arc::new(jwt),
        }
    }

    pub fn jwt_settings(&self) -> &JwtSettings {
        &self.jwt
    }

    /// Create a user and open their first session.
    ///
    /// # Errors
    /// * `Validation` for bad name, email, password or role
    /// * `Conflict` if the email is already registered (any case)
    pub async fn register(&self, registration: Registration) -> Result<RegisteredUser, AppError> {
        let name = is_valid_name(&registration.name)?;
        let email = is_valid_email(&registration.email)?;
        is_valid_password("password", &registration.password)?;
        let role = parse_role(registration.role.as_deref())?;

        if self.users.find_by_email(&email).await?.is_some() {
            tracing::info!("Registration rejected: email already registered");
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let password_hash = hash_blocking(registration.password).await?;

        let user = self
            .users
            .create(NewUser {
                name,
                email,
                password_hash,
                role,
            })
            .await?;

        let tokens = self.open_session(&user).await?;

        tracing::info!(user_id = user.id, role = %user.role, "User registered");

        Ok(RegisteredUser {
            user: UserProfile::from(&user),
            tokens,
        })
    }

    /// Authenticate with email and password and open a new session.
    /// Earlier sessions stay valid.
    ///
    /// # Errors
    /// * `Validation` for a malformed email
    /// * `InvalidCredentials` for an unknown email or wrong password, with
    ///   no way to tell the two apart
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, AppError> {
        let email = is_valid_email(email)?;
        let user = self.users.find_by_email(&email).await?;

        let stored_hash = match &user {
            Some(user) => user.password_hash.clone(),
            None => TIMING_GUARD_HASH.clone(),
        };
        let password_matches = verify_blocking(password.to_string(), stored_hash).await?;

        let user = match user {
            Some(user) if password_matches => user,
            Some(user) => {
                tracing::warn!(user_id = user.id, "Login failed: wrong password");
                return Err(AuthError::InvalidCredentials.into());
            }
            None => {
                tracing::warn!("Login failed: unknown email");
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        let tokens = self.open_session(&user).await?;
        tracing::info!(user_id = user.id, "User logged in");

        Ok(tokens)
    }

    /// Exchange a refresh token for a new access token, rotating the
    /// session in place. The presented token is dead afterwards.
    ///
    /// # Errors
    /// * `Validation` if the token is empty
    /// * `InvalidRefreshToken` for unknown, revoked, expired or
    ///   concurrently-rotated tokens
    pub async fn refresh(&self, raw_refresh_token: &str) -> Result<TokenPair, AppError> {
        let raw = require_refresh_token(raw_refresh_token)?;
        let current_hash = hash_refresh_token(raw);
        let now = Utc::now();

        let record = match self.tokens.find_active_by_hash(&current_hash).await? {
            Some(record) => record,
            None => {
                tracing::warn!("Refresh rejected: no active session for token");
                return Err(AuthError::InvalidRefreshToken.into());
            }
        };

        if record.is_expired_at(now) {
            tracing::info!(
                user_id = record.user_id,
                session_id = record.id,
                "Refresh rejected: session expired"
            );
            return Err(AuthError::InvalidRefreshToken.into());
        }

        let user = match self.users.find_by_id(record.user_id).await? {
            Some(user) => user,
            None => {
                tracing::warn!(session_id = record.id, "Refresh rejected: session owner missing");
                return Err(AuthError::InvalidRefreshToken.into());
            }
        };

        let secret = generate_refresh_secret();
        let rotated = self
            .tokens
            .rotate(record.id, &current_hash, &secret.hash, self.refresh_expiry_from(now))
            .await?;

        if rotated.is_none() {
            tracing::warn!(
                user_id = user.id,
                session_id = record.id,
                "Refresh rejected: session rotated or revoked concurrently"
            );
            return Err(AuthError::InvalidRefreshToken.into());
        }

        let access_token = generate_access_token(user.id, user.role, &self.jwt)?;
        tracing::info!(user_id = user.id, session_id = record.id, "Session refreshed");

        Ok(self.token_pair(access_token, secret.raw))
    }

    /// Revoke the session behind a refresh token. Unknown or already
    /// revoked tokens succeed too.
    ///
    /// # Errors
    /// * `Validation` if the token is empty
    pub async fn logout(&self, raw_refresh_token: &str) -> Result<(), AppError> {
        let raw = require_refresh_token(raw_refresh_token)?;

        match self.tokens.find_by_hash(&hash_refresh_token(raw)).await? {
            Some(record) => {
                self.tokens.revoke(record.id).await?;
                tracing::info!(
                    user_id = record.user_id,
                    session_id = record.id,
                    "Session logged out"
                );
            }
            None => tracing::debug!("Logout for unknown token treated as success"),
        }

        Ok(())
    }

    /// Revoke one of the caller's own sessions.
    ///
    /// # Errors
    /// * `Forbidden` if the session does not exist or belongs to someone
    ///   else (indistinguishable on purpose)
    pub async fn logout_session(&self, user_id: i64, session_id: i64) -> Result<(), AppError> {
        match self.tokens.find_by_id(session_id).await? {
            Some(record) if record.user_id == user_id => {
                self.tokens.revoke(record.id).await?;
                tracing::info!(user_id, session_id, "Session revoked by owner");
                Ok(())
            }
            _ => {
                tracing::warn!(user_id, session_id, "Session revoke denied");
                Err(AppError::Forbidden("Session does not belong to caller".to_string()))
            }
        }
    }

    /// Revoke every active session of a user, returning how many there were.
    pub async fn logout_all(&self, user_id: i64) -> Result<u64, AppError> {
        let revoked = self.tokens.revoke_all_for_user(user_id).await?;
        tracing::info!(user_id, revoked, "All sessions revoked");
        Ok(revoked)
    }

    pub async fn list_sessions(&self, user_id: i64) -> Result<Vec<SessionSummary>, AppError> {
        let now = Utc::now();
        Ok(self
            .tokens
            .list_active_for_user(user_id)
            .await?
            .iter()
            .map(|record| SessionSummary::from_record(record, now))
            .collect())
    }

    pub async fn current_user(&self, user_id: i64) -> Result<UserProfile, AppError> {
        self.users
            .find_by_id(user_id)
            .await?
            .map(|user| UserProfile::from(&user))
            .ok_or_else(|| AppError::NotFound("User".to_string()))
    }

    /// Change the caller's password and sign out all their sessions.
    /// Returns the number of sessions revoked.
    ///
    /// # Errors
    /// * `Validation` if the new password breaks policy or equals the old one
    /// * `InvalidCredentials` if the current password is wrong
    /// * `NotFound` if the user no longer exists
    pub async fn change_password(
        &self,
        user_id: i64,
        current_password: &str,
        new_password: &str,
    ) -> Result<u64, AppError> {
        if current_password.is_empty() {
            return Err(ValidationError::MissingField("currentPassword".to_string()).into());
        }
        is_valid_password("newPassword", new_password)?;
        if current_password == new_password {
            return Err(ValidationError::InvalidValue(
                "newPassword".to_string(),
                "must differ from the current password".to_string(),
            )
            .into());
        }

        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User".to_string()))?;

        if !verify_blocking(current_password.to_string(), user.password_hash.clone()).await? {
            tracing::warn!(user_id, "Password change rejected: wrong current password");
            return Err(AuthError::InvalidCredentials.into());
        }

        let password_hash = hash_blocking(new_password.to_string()).await?;
        self.users.update_password(user_id, &password_hash).await?;
        let revoked = self.tokens.revoke_all_for_user(user_id).await?;

        tracing::info!(user_id, revoked, "Password changed");
        Ok(revoked)
    }

    /// Every user with their non-revoked sessions, for administrators.
    pub async fn list_active_users(&self) -> Result<Vec<UserSessions>, AppError> {
        let now = Utc::now();
        let mut result = Vec::new();

        for user in self.users.list().await? {
            let sessions: Vec<SessionSummary> = self
                .tokens
                .list_active_for_user(user.id)
                .await?
                .iter()
                .map(|record| SessionSummary::from_record(record, now))
                .collect();
            result.push(UserSessions {
                user: UserProfile::from(&user),
                active_sessions: sessions.iter().filter(|s| s.active).count(),
                last_session_at: sessions.iter().map(|s| s.created_at).max(),
                sessions,
            });
        }

        Ok(result)
    }

    async fn open_session(&self, user: &User) -> Result<TokenPair, AppError> {
        let access_token = generate_access_token(user.id, user.role, &self.jwt)?;
        let secret = generate_refresh_secret();
        let record = self
            .tokens
            .create(user.id, &secret.hash, self.refresh_expiry_from(Utc::now()))
            .await?;

        tracing::debug!(user_id = user.id, session_id = record.id, "Session opened");
        Ok(self.token_pair(access_token, secret.raw))
    }

    fn refresh_expiry_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::seconds(self.jwt.refresh_token_expiry)
    }

    fn token_pair(&self, access_token: String, refresh_token: String) -> TokenPair {
        TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt.access_token_expiry,
        }
    }
}

fn require_refresh_token(raw: &str) -> Result<&str, AppError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingField("refreshToken".to_string()).into());
    }
    Ok(trimmed)
}

async fn hash_blocking(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hash_password(&password)).await?
}

async fn verify_blocking(password: String, hash: String) -> Result<bool, AppError> {
    Ok(tokio::task::spawn_blocking(move || verify_password(&password, &hash)).await?)
}
