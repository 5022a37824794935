//! Refresh token storage
//!
//! Persisted record of every issued refresh token. Access tokens are never
//! stored.

use crate::error::{conflict_error, AppError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// One issued refresh token
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshTokenRecord {
    pub id: Uuid,
    pub token: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
}

impl RefreshTokenRecord {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Persistence contract for refresh tokens.
///
/// `revoke` must be a compare-and-set visible to every later
/// `find_active_by_value`: it returns `true` only for the one caller that
/// flipped the record from active to revoked.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn create(
        &self,
        user_id: Uuid,
        token: &str,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshTokenRecord, AppError>;

    /// Only returns records with `revoked = false`; expiry is the caller's check
    async fn find_active_by_value(&self, token: &str) -> Result<Option<RefreshTokenRecord>, AppError>;

    async fn revoke(&self, record: &RefreshTokenRecord) -> Result<bool, AppError>;

    /// Number of records removed
    async fn delete_all_for_user(&self, user_id: Uuid) -> Result<u64, AppError>;
}

/// In-memory refresh token store, keyed by token string
pub struct InMemoryRefreshTokenStore {
    tokens: Arc<RwLock<HashMap<String, RefreshTokenRecord>>>,
}

impl InMemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self {
            tokens: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Records for a user, revoked or not
    pub async fn list_for_user(&self, user_id: Uuid) -> Vec<RefreshTokenRecord> {
        let tokens = self.tokens.read().await;
        tokens
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }
}

impl Default for InMemoryRefreshTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryRefreshTokenStore {
    async fn create(
        &self,
        user_id: Uuid,
        token: &str,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshTokenRecord, AppError> {
        let mut tokens = self.tokens.write().await;

        if tokens.contains_key(token) {
            return Err(conflict_error("Refresh token already recorded"));
        }

        let record = RefreshTokenRecord {
            id: Uuid::new_v4(),
            token: token.to_string(),
            user_id,
            created_at: issued_at,
            expires_at,
            revoked: false,
        };
        tokens.insert(record.token.clone(), record.clone());

        Ok(record)
    }

    async fn find_active_by_value(&self, token: &str) -> Result<Option<RefreshTokenRecord>, AppError> {
        let tokens = self.tokens.read().await;
        Ok(tokens.get(token).filter(|t| !t.revoked).cloned())
    }

    async fn revoke(&self, record: &RefreshTokenRecord) -> Result<bool, AppError> {
        let mut tokens = self.tokens.write().await;
        match tokens.get_mut(&record.token) {
            Some(stored) if !stored.revoked => {
                stored.revoked = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_all_for_user(&self, user_id: Uuid) -> Result<u64, AppError> {
        let mut tokens = self.tokens.write().await;
        let before = tokens.len();
        tokens.retain(|_, t| t.user_id != user_id);
        Ok((before - tokens.len()) as u64)
    }
}
