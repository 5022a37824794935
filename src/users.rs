//! User management module
//!
//! Handles user storage and retrieval.

use crate::auth::Role;
use crate::error::{conflict_error, not_found_error, AppError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// User model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub disabled: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// User response (without sensitive data)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub disabled: bool,
    pub last_login: Option<DateTime<Utc>>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        UserResponse {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            role: user.role,
            disabled: user.disabled,
            last_login: user.last_login,
        }
    }
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse::from(&user)
    }
}

/// Column changes for `UserStore::update`; `None` leaves a column alone.
/// Username, `last_login` and `created_at` are never written through a patch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserPatch {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<Role>,
    pub disabled: Option<bool>,
}

impl UserPatch {
    pub fn apply_to(&self, user: &mut User) {
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
        if let Some(first_name) = &self.first_name {
            user.first_name = first_name.clone();
        }
        if let Some(last_name) = &self.last_name {
            user.last_name = last_name.clone();
        }
        if let Some(password_hash) = &self.password_hash {
            user.password_hash = password_hash.clone();
        }
        if let Some(role) = self.role {
            user.role = role;
        }
        if let Some(disabled) = self.disabled {
            user.disabled = disabled;
        }
    }
}

/// Identity persistence contract. Username and email are each unique.
///
/// Writes that follow a policy check are conditional on the role the check
/// saw, so a concurrent role change makes them miss instead of landing.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;

    /// Insert a new user; `Conflict` if the username or email is taken
    async fn create(&self, user: User) -> Result<User, AppError>;

    /// Apply `patch` while the stored role is still `expected_role`.
    ///
    /// `Ok(None)` when the role has changed, `NotFound` when the user is gone,
    /// `Conflict` if the new email belongs to someone else.
    async fn update(
        &self,
        id: Uuid,
        expected_role: Role,
        patch: &UserPatch,
    ) -> Result<Option<User>, AppError>;

    /// Remove a user while its role is still `expected_role`; `Ok(false)` when
    /// the role has changed. Refresh tokens are the caller's to remove (the
    /// Postgres schema also cascades them).
    async fn delete(&self, id: Uuid, expected_role: Role) -> Result<bool, AppError>;

    async fn list(&self) -> Result<Vec<User>, AppError>;

    async fn exists_with_role(&self, role: Role) -> Result<bool, AppError>;

    async fn touch_last_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), AppError>;
}

#[derive(Default)]
struct UserTable {
    users: HashMap<Uuid, User>,
    username_index: HashMap<String, Uuid>,
    email_index: HashMap<String, Uuid>,
}

/// In-memory user store
pub struct InMemoryUserStore {
    // One lock over rows and indexes so uniqueness checks and writes are atomic.
    table: Arc<RwLock<UserTable>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self {
            table: Arc::new(RwLock::new(UserTable::default())),
        }
    }
}

impl Default for InMemoryUserStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let table = self.table.read().await;
        Ok(table
            .username_index
            .get(username)
            .and_then(|id| table.users.get(id).cloned()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let table = self.table.read().await;
        Ok(table.users.get(&id).cloned())
    }

    async fn create(&self, user: User) -> Result<User, AppError> {
        let mut table = self.table.write().await;

        if table.username_index.contains_key(&user.username)
            || table.email_index.contains_key(&user.email)
        {
            return Err(conflict_error("Username or Email already registered"));
        }

        table.username_index.insert(user.username.clone(), user.id);
        table.email_index.insert(user.email.clone(), user.id);
        table.users.insert(user.id, user.clone());

        Ok(user)
    }

    async fn update(
        &self,
        id: Uuid,
        expected_role: Role,
        patch: &UserPatch,
    ) -> Result<Option<User>, AppError> {
        let mut table = self.table.write().await;

        let mut updated = table
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found_error("User not found"))?;
        if updated.role != expected_role {
            return Ok(None);
        }

        let previous_email = updated.email.clone();
        patch.apply_to(&mut updated);

        if updated.email != previous_email {
            if table.email_index.contains_key(&updated.email) {
                return Err(conflict_error("Email already in use"));
            }
            table.email_index.remove(&previous_email);
            table.email_index.insert(updated.email.clone(), id);
        }

        table.users.insert(id, updated.clone());
        Ok(Some(updated))
    }

    async fn delete(&self, id: Uuid, expected_role: Role) -> Result<bool, AppError> {
        let mut table = self.table.write().await;

        match table.users.get(&id) {
            None => return Err(not_found_error("User not found")),
            Some(user) if user.role != expected_role => return Ok(false),
            Some(_) => {}
        }

        if let Some(user) = table.users.remove(&id) {
            table.username_index.remove(&user.username);
            table.email_index.remove(&user.email);
        }
        Ok(true)
    }

    async fn list(&self) -> Result<Vec<User>, AppError> {
        let table = self.table.read().await;
        let mut users: Vec<User> = table.users.values().cloned().collect();
        users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.username.cmp(&b.username)));
        Ok(users)
    }

    async fn exists_with_role(&self, role: Role) -> Result<bool, AppError> {
        let table = self.table.read().await;
        Ok(table.users.values().any(|u| u.role == role))
    }

    async fn touch_last_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), AppError> {
        let mut table = self.table.write().await;
        let user = table
            .users
            .get_mut(&id)
            .ok_or_else(|| not_found_error("User not found"))?;
        user.last_login = Some(at);
        Ok(())
    }
}
