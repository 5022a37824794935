//! Staff account administration
//!
//! Identity create/edit/delete/list, each gated by the role policy before any
//! write reaches the store.

use crate::auth::{authorize, resolve_created_role, Action, PasswordHasher, RefreshTokenStore, Role};
use crate::clock::Clock;
use crate::error::{conflict_error, not_found_error, AppError};
use crate::users::{User, UserPatch, UserStore};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

const MAX_WRITE_ATTEMPTS: usize = 3;

/// Fields for a new account
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub role: Option<Role>,
    pub disabled: bool,
}

/// Partial update; `None` leaves a field alone
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
    pub disabled: Option<bool>,
}

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UserStore>,
    tokens: Arc<dyn RefreshTokenStore>,
    hasher: PasswordHasher,
    clock: Arc<dyn Clock>,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UserStore>,
        tokens: Arc<dyn RefreshTokenStore>,
        hasher: PasswordHasher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            tokens,
            hasher,
            clock,
        }
    }

    /// Create an account on behalf of `actor`. Role defaults to staff.
    pub async fn create_user(&self, actor: &User, new_user: NewUser) -> Result<User, AppError> {
        let role = resolve_created_role(actor, new_user.role)?;
        let created = self.insert(new_user, role).await?;

        info!(actor = %actor.username, user_id = %created.id, role = %created.role, "User created");
        Ok(created)
    }

    /// Bootstrap the first owner. Refused once any owner exists.
    pub async fn initialize_owner(&self, new_user: NewUser) -> Result<User, AppError> {
        if self.users.exists_with_role(Role::Owner).await? {
            return Err(AppError::BadRequest("Owner already exists".to_string()));
        }

        let owner = self.insert(new_user, Role::Owner).await?;
        info!(user_id = %owner.id, "Owner initialized");
        Ok(owner)
    }

    /// Apply `changes` to an account on behalf of `actor`.
    ///
    /// The store write is conditional on the role the policy check saw. If the
    /// target's role changes in between, the check runs again against the new
    /// role before another attempt.
    pub async fn update_user(
        &self,
        actor: &User,
        user_id: Uuid,
        changes: UserChanges,
    ) -> Result<User, AppError> {
        let role_change = changes.role;
        let disabling = changes.disabled == Some(true);

        let mut target = self.find(user_id).await?;
        authorize_update(actor, role_change, disabling, target.role)?;

        let password_hash = match changes.password {
            Some(password) => Some(self.hasher.hash_blocking(password).await?),
            None => None,
        };
        let patch = UserPatch {
            email: changes.email,
            first_name: changes.first_name,
            last_name: changes.last_name,
            password_hash,
            role: changes.role,
            disabled: changes.disabled,
        };

        for _ in 0..MAX_WRITE_ATTEMPTS {
            if let Some(saved) = self.users.update(user_id, target.role, &patch).await? {
                info!(actor = %actor.username, user_id = %saved.id, "User updated");
                return Ok(saved);
            }

            target = self.find(user_id).await?;
            authorize_update(actor, role_change, disabling, target.role)?;
        }

        Err(conflict_error("User is being modified concurrently, please retry"))
    }

    /// Delete an account and every refresh token it owns
    pub async fn delete_user(&self, actor: &User, user_id: Uuid) -> Result<(), AppError> {
        let mut target = self.find(user_id).await?;

        for _ in 0..MAX_WRITE_ATTEMPTS {
            authorize(actor, Action::DeleteIdentity, Some(target.role))?;

            if self.users.delete(user_id, target.role).await? {
                self.tokens.delete_all_for_user(user_id).await?;
                info!(actor = %actor.username, user_id = %user_id, "User deleted");
                return Ok(());
            }

            target = self.find(user_id).await?;
        }

        Err(conflict_error("User is being modified concurrently, please retry"))
    }

    pub async fn list_users(&self, actor: &User) -> Result<Vec<User>, AppError> {
        authorize(actor, Action::ListIdentities, None)?;
        self.users.list().await
    }

    async fn find(&self, user_id: Uuid) -> Result<User, AppError> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| not_found_error("User not found"))
    }

    async fn insert(&self, new_user: NewUser, role: Role) -> Result<User, AppError> {
        if self.users.find_by_username(&new_user.username).await?.is_some() {
            return Err(conflict_error("Username or Email already registered"));
        }

        let password_hash = self.hasher.hash_blocking(new_user.password).await?;

        let user = User {
            id: Uuid::new_v4(),
            username: new_user.username,
            email: new_user.email,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            password_hash,
            role,
            disabled: new_user.disabled,
            last_login: None,
            created_at: self.clock.now(),
        };

        self.users.create(user).await
    }
}

fn authorize_update(
    actor: &User,
    role_change: Option<Role>,
    disabling: bool,
    target: Role,
) -> Result<(), AppError> {
    authorize(actor, Action::ModifyIdentity { role_change }, Some(target))?;
    if disabling {
        authorize(actor, Action::DisableIdentity, Some(target))?;
    }
    Ok(())
}
