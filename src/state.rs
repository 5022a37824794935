//! Application state management
//!
//! Contains shared state accessible across all handlers. Built once from
//! `Settings` plus the chosen store backends; read-only afterwards.

use crate::accounts::AccountService;
use crate::auth::{PasswordHasher, RefreshTokenStore, SessionManager};
use crate::clock::Clock;
use crate::config::AuthConfig;
use crate::users::UserStore;
use std::sync::Arc;

/// Application state shared across all handlers
pub struct AppState {
    /// Login, refresh-token rotation, bearer resolution
    pub sessions: SessionManager,

    /// Policy-gated staff account administration
    pub accounts: AccountService,

    /// Expected `X-Initialize-Owner-Token` value
    pub initialize_owner_key: String,
}

impl AppState {
    pub fn new(
        users: Arc<dyn UserStore>,
        tokens: Arc<dyn RefreshTokenStore>,
        clock: Arc<dyn Clock>,
        auth: &AuthConfig,
    ) -> Self {
        let sessions = SessionManager::new(users.clone(), tokens.clone(), clock.clone(), auth);
        let accounts =
            AccountService::new(users, tokens, PasswordHasher::new(auth.bcrypt_cost), clock);

        Self {
            sessions,
            accounts,
            initialize_owner_key: auth.initialize_owner_key.clone(),
        }
    }
}

/// Type alias for shared state
pub type SharedState = Arc<AppState>;
