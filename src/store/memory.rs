use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use super::{NewUser, PurgeReport, RefreshTokenRecord, RefreshTokenStore, User, UserStore};
use crate::error::AppError;

/// In-process store with the same semantics as the Postgres one.
///
/// The lock is never held across an `.await`.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    users: BTreeMap<i64, User>,
    tokens: BTreeMap<i64, RefreshTokenRecord>,
    next_user_id: i64,
    next_token_id: i64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn create(&self, user: NewUser) -> Result<User, AppError> {
        let mut state = self.lock();
        let email = user.email.to_lowercase();

        if state.users.values().any(|u| u.email == email) {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        state.next_user_id += 1;
        let created = User {
            id: state.next_user_id,
            name: user.name,
            email,
            password_hash: user.password_hash,
            role: user.role,
            created_at: Utc::now(),
        };
        state.users.insert(created.id, created.clone());

        Ok(created)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let email = email.to_lowercase();
        Ok(self.lock().users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        Ok(self.lock().users.get(&id).cloned())
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<(), AppError> {
        match self.lock().users.get_mut(&id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                Ok(())
            }
            None => Err(AppError::NotFound("User".to_string())),
        }
    }

    async fn list(&self) -> Result<Vec<User>, AppError> {
        Ok(self.lock().users.values().cloned().collect())
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryStore {
    async fn create(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshTokenRecord, AppError> {
        let mut state = self.lock();

        state.next_token_id += 1;
        let record = RefreshTokenRecord {
            id: state.next_token_id,
            user_id,
            token_hash: token_hash.to_string(),
            expires_at,
            revoked: false,
            revoked_at: None,
            created_at: Utc::now(),
        };
        state.tokens.insert(record.id, record.clone());

        Ok(record)
    }

    async fn find_active_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, AppError> {
        Ok(self
            .lock()
            .tokens
            .values()
            .find(|t| t.token_hash == token_hash && !t.revoked)
            .cloned())
    }

    async fn find_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, AppError> {
        Ok(self
            .lock()
            .tokens
            .values()
            .find(|t| t.token_hash == token_hash)
            .cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<RefreshTokenRecord>, AppError> {
        Ok(self.lock().tokens.get(&id).cloned())
    }

    async fn list_active_for_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<RefreshTokenRecord>, AppError> {
        let mut records: Vec<_> = self
            .lock()
            .tokens
            .values()
            .filter(|t| t.user_id == user_id && !t.revoked)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        Ok(records)
    }

    async fn rotate(
        &self,
        id: i64,
        current_hash: &str,
        new_hash: &str,
        new_expires_at: DateTime<Utc>,
    ) -> Result<Option<RefreshTokenRecord>, AppError> {
        let mut state = self.lock();

        match state.tokens.get_mut(&id) {
            Some(record) if record.token_hash == current_hash && !record.revoked => {
                record.token_hash = new_hash.to_string();
                record.expires_at = new_expires_at;
                Ok(Some(record.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn revoke(&self, id: i64) -> Result<(), AppError> {
        if let Some(record) = self.lock().tokens.get_mut(&id) {
            if !record.revoked {
                record.revoked = true;
                record.revoked_at = Some(Utc::now());
            }
        }
        Ok(())
    }

    async fn revoke_all_for_user(&self, user_id: i64) -> Result<u64, AppError> {
        let now = Utc::now();
        let mut count = 0;

        for record in self.lock().tokens.values_mut() {
            if record.user_id == user_id && !record.revoked {
                record.revoked = true;
                record.revoked_at = Some(now);
                count += 1;
            }
        }

        Ok(count)
    }

    async fn purge_expired_and_stale_revoked(
        &self,
        retention_days: i64,
    ) -> Result<PurgeReport, AppError> {
        let now = Utc::now();
        let cutoff = now - Duration::days(retention_days);
        let mut state = self.lock();

        let before = state.tokens.len();
        state.tokens.retain(|_, t| t.expires_at > now);
        let expired = (before - state.tokens.len()) as u64;

        let before = state.tokens.len();
        state
            .tokens
            .retain(|_, t| !(t.revoked && t.revoked_at.unwrap_or(t.created_at) <= cutoff));
        let revoked = (before - state.tokens.len()) as u64;

        Ok(PurgeReport { expired, revoked })
    }
}
