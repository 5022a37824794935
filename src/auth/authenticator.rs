//! Username/password verification

use crate::auth::PasswordHasher;
use crate::clock::Clock;
use crate::error::AppError;
use crate::users::{User, UserStore};
use std::sync::Arc;
use tracing::{debug, warn};

/// Checks credentials against the user store
#[derive(Clone)]
pub struct Authenticator {
    users: Arc<dyn UserStore>,
    hasher: PasswordHasher,
    clock: Arc<dyn Clock>,
}

impl Authenticator {
    pub fn new(users: Arc<dyn UserStore>, hasher: PasswordHasher, clock: Arc<dyn Clock>) -> Self {
        Self {
            users,
            hasher,
            clock,
        }
    }

    /// Authenticate a user by username and password.
    ///
    /// Checks run in order and stop at the first failure:
    /// 1. Unknown username → `InvalidCredentials`
    /// 2. Disabled account → `AccountDisabled` (password not even checked)
    /// 3. Password mismatch → `InvalidCredentials`
    ///
    /// On success `last_login` is stamped. That write is best-effort: a failure
    /// is logged and the login still succeeds.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User, AppError> {
        let mut user = self
            .users
            .find_by_username(username)
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        if user.disabled {
            return Err(AppError::AccountDisabled);
        }

        let matches = self
            .hasher
            .verify_blocking(password.to_string(), user.password_hash.clone())
            .await?;
        if !matches {
            return Err(AppError::InvalidCredentials);
        }

        let now = self.clock.now();
        match self.users.touch_last_login(user.id, now).await {
            Ok(()) => {
                user.last_login = Some(now);
                debug!(user_id = %user.id, "Updated last login");
            }
            Err(e) => {
                warn!(user_id = %user.id, error = %e, "Failed to record last login");
            }
        }

        Ok(user)
    }
}
