//! Session lifecycle: login, refresh-token rotation, logout, bearer resolution.

use crate::auth::{
    Authenticator, PasswordHasher, RefreshTokenStore, TokenCodec, TokenPair, TokenType,
};
use crate::clock::Clock;
use crate::config::AuthConfig;
use crate::error::AppError;
use crate::users::{User, UserStore};
use chrono::Duration;
use std::sync::Arc;
use tracing::{info, warn};

/// Issues, rotates, and resolves tokens.
///
/// Access tokens are stateless: once issued they stay valid until they expire.
/// A disabled account is cut off at its next request only because
/// `resolve_bearer` reloads the user every time; the residual window is at
/// most one access-token TTL for clients that never call back.
#[derive(Clone)]
pub struct SessionManager {
    authenticator: Authenticator,
    codec: TokenCodec,
    users: Arc<dyn UserStore>,
    tokens: Arc<dyn RefreshTokenStore>,
    clock: Arc<dyn Clock>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl SessionManager {
    pub fn new(
        users: Arc<dyn UserStore>,
        tokens: Arc<dyn RefreshTokenStore>,
        clock: Arc<dyn Clock>,
        config: &AuthConfig,
    ) -> Self {
        let hasher = PasswordHasher::new(config.bcrypt_cost);
        Self {
            authenticator: Authenticator::new(users.clone(), hasher, clock.clone()),
            codec: TokenCodec::from_config(config),
            users,
            tokens,
            clock,
            access_ttl: Duration::minutes(config.access_token_ttl_minutes),
            refresh_ttl: Duration::days(config.refresh_token_ttl_days),
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Verify credentials and issue a fresh access/refresh pair
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenPair, AppError> {
        let user = match self.authenticator.authenticate(username, password).await {
            Ok(user) => user,
            Err(e) => {
                if e.is_auth_failure() {
                    warn!(username = %username, reason = %e, "Login rejected");
                }
                return Err(e);
            }
        };

        let tokens = self.issue_pair(&user).await?;
        info!(user_id = %user.id, role = %user.role, "User logged in");
        Ok(tokens)
    }

    /// Redeem a refresh token for a new pair.
    ///
    /// The presented token is revoked before anything new is issued, and that
    /// revoke is never undone: whatever happens afterwards, the token cannot be
    /// redeemed twice. Of two concurrent calls with the same token, only the one
    /// whose revoke flips the record proceeds.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AppError> {
        let now = self.clock.now();

        let claims = self
            .codec
            .decode(refresh_token, now)
            .map_err(|_| AppError::InvalidToken)?;
        if claims.token_type != TokenType::Refresh {
            return Err(AppError::InvalidToken);
        }

        let record = self
            .tokens
            .find_active_by_value(refresh_token)
            .await?
            .ok_or(AppError::InvalidToken)?;

        if record.is_expired_at(now) {
            return Err(AppError::InvalidToken);
        }

        if !self.tokens.revoke(&record).await? {
            warn!(user_id = %record.user_id, "Refresh token already redeemed");
            return Err(AppError::InvalidToken);
        }

        let user = self
            .users
            .find_by_id(record.user_id)
            .await?
            .filter(|u| !u.disabled && u.username == claims.sub)
            .ok_or(AppError::InvalidToken)?;

        let tokens = self.issue_pair(&user).await?;
        info!(user_id = %user.id, "Refresh token rotated");
        Ok(tokens)
    }

    /// Revoke a refresh token. Unknown, already-revoked and expired refresh
    /// tokens are not an error; access tokens and forgeries are.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AppError> {
        let claims = self
            .codec
            .verify(refresh_token)
            .map_err(|_| AppError::InvalidToken)?;
        if claims.token_type != TokenType::Refresh {
            return Err(AppError::InvalidToken);
        }
        if claims.is_expired_at(self.clock.now()) {
            return Ok(());
        }

        if let Some(record) = self.tokens.find_active_by_value(refresh_token).await? {
            if self.tokens.revoke(&record).await? {
                info!(user_id = %record.user_id, "Refresh token revoked on logout");
            }
        }
        Ok(())
    }

    /// Resolve a bearer access token to the current, enabled user
    pub async fn resolve_bearer(&self, access_token: &str) -> Result<User, AppError> {
        let claims = self
            .codec
            .decode(access_token, self.clock.now())
            .map_err(|e| AppError::Unauthorized(e.to_string()))?;
        if claims.token_type != TokenType::Access {
            return Err(AppError::Unauthorized("Not an access token".to_string()));
        }

        let user = self
            .users
            .find_by_username(&claims.sub)
            .await?
            .ok_or_else(|| AppError::Unauthorized("User not found".to_string()))?;

        if user.disabled {
            return Err(AppError::Unauthorized("Inactive user".to_string()));
        }

        Ok(user)
    }

    /// Sign both tokens and persist the refresh token. Fails as a whole if the
    /// refresh record cannot be written.
    async fn issue_pair(&self, user: &User) -> Result<TokenPair, AppError> {
        let now = self.clock.now();

        let (access_token, _) =
            self.codec
                .issue(&user.username, TokenType::Access, now, self.access_ttl)?;
        let (refresh_token, refresh_claims) =
            self.codec
                .issue(&user.username, TokenType::Refresh, now, self.refresh_ttl)?;

        self.tokens
            .create(user.id, &refresh_token, now, refresh_claims.expires_at())
            .await?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "bearer".to_string(),
            expires_in: self.access_ttl.num_seconds(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{InMemoryRefreshTokenStore, Role};
    use crate::clock::ManualClock;
    use crate::users::tests::sample_user;
    use crate::users::{InMemoryUserStore, UserPatch};
    use pretty_assertions::assert_eq;
    use tokio_test::assert_err;

    struct Harness {
        sessions: SessionManager,
        users: Arc<InMemoryUserStore>,
        tokens: Arc<InMemoryRefreshTokenStore>,
        clock: Arc<ManualClock>,
    }

    async fn harness() -> Harness {
        let config = AuthConfig {
            jwt_secret: "session-test-secret".to_string(),
            bcrypt_cost: 4,
            ..AuthConfig::default()
        };
        let hasher = PasswordHasher::new(config.bcrypt_cost);
        let users = Arc::new(InMemoryUserStore::new());
        users
            .create(sample_user("alice", Role::Staff, &hasher.hash("correct").unwrap()))
            .await
            .unwrap();

        let tokens = Arc::new(InMemoryRefreshTokenStore::new());
        let clock = Arc::new(ManualClock::default());
        let sessions = SessionManager::new(users.clone(), tokens.clone(), clock.clone(), &config);

        Harness {
            sessions,
            users,
            tokens,
            clock,
        }
    }

    async fn disable(users: &InMemoryUserStore, username: &str) {
        let user = users.find_by_username(username).await.unwrap().unwrap();
        let patch = UserPatch {
            disabled: Some(true),
            ..UserPatch::default()
        };
        users.update(user.id, user.role, &patch).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_login_issues_tokens_for_the_user() {
        let h = harness().await;
        let pair = h.sessions.login("alice", "correct").await.unwrap();

        let claims = h.sessions.codec().decode(&pair.access_token, h.clock.now()).unwrap();
        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.token_type, TokenType::Access);
        assert_eq!(pair.token_type, "bearer");
        assert_eq!(pair.expires_in, 15 * 60);

        let record = h.tokens.find_active_by_value(&pair.refresh_token).await.unwrap().unwrap();
        assert!(!record.revoked);
        assert_eq!(record.expires_at.timestamp(), (h.clock.now() + Duration::days(7)).timestamp());
    }

    #[tokio::test]
    async fn test_login_fails_for_disabled_account() {
        let h = harness().await;
        disable(&h.users, "alice").await;

        assert!(matches!(
            h.sessions.login("alice", "correct").await,
            Err(AppError::AccountDisabled)
        ));
        assert!(matches!(
            h.sessions.login("alice", "wrong").await,
            Err(AppError::AccountDisabled)
        ));
    }

    #[tokio::test]
    async fn test_refresh_rotates_and_rejects_replay() {
        let h = harness().await;
        let first = h.sessions.login("alice", "correct").await.unwrap();

        let second = h.sessions.refresh(&first.refresh_token).await.unwrap();
        assert_ne!(second.refresh_token, first.refresh_token);
        assert_eq!(
            h.tokens.find_active_by_value(&first.refresh_token).await.unwrap(),
            None
        );

        assert!(matches!(
            h.sessions.refresh(&first.refresh_token).await,
            Err(AppError::InvalidToken)
        ));
        assert!(h.sessions.refresh(&second.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_refresh_has_one_winner() {
        let h = harness().await;
        let pair = h.sessions.login("alice", "correct").await.unwrap();

        let a = h.sessions.clone();
        let b = h.sessions.clone();
        let token_a = pair.refresh_token.clone();
        let token_b = pair.refresh_token.clone();
        let (ra, rb) = tokio::join!(
            tokio::spawn(async move { a.refresh(&token_a).await }),
            tokio::spawn(async move { b.refresh(&token_b).await }),
        );

        let results = [ra.unwrap(), rb.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(AppError::InvalidToken))));
    }

    #[tokio::test]
    async fn test_refresh_rejects_access_tokens_and_garbage() {
        let h = harness().await;
        let pair = h.sessions.login("alice", "correct").await.unwrap();

        assert!(matches!(
            h.sessions.refresh(&pair.access_token).await,
            Err(AppError::InvalidToken)
        ));
        assert!(matches!(
            h.sessions.refresh("garbage").await,
            Err(AppError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_refresh_after_expiry_fails() {
        let h = harness().await;
        let pair = h.sessions.login("alice", "correct").await.unwrap();

        h.clock.advance(Duration::days(7) + Duration::seconds(1));
        assert!(matches!(
            h.sessions.refresh(&pair.refresh_token).await,
            Err(AppError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_refresh_rejects_expired_record_with_live_claims() {
        let h = harness().await;
        let alice = h.users.find_by_username("alice").await.unwrap().unwrap();
        let now = h.clock.now();

        let (token, _) = h
            .sessions
            .codec()
            .issue("alice", TokenType::Refresh, now, Duration::days(7))
            .unwrap();
        h.tokens
            .create(alice.id, &token, now, now + Duration::minutes(1))
            .await
            .unwrap();

        h.clock.advance(Duration::minutes(2));
        assert!(matches!(
            h.sessions.refresh(&token).await,
            Err(AppError::InvalidToken)
        ));
        // Rejected before the revoke step
        assert!(h.tokens.find_active_by_value(&token).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_login_with_unrepresentable_lifetime_fails_cleanly() {
        let config = AuthConfig {
            jwt_secret: "session-test-secret".to_string(),
            bcrypt_cost: 4,
            refresh_token_ttl_days: 100_000_000,
            ..AuthConfig::default()
        };
        let hasher = PasswordHasher::new(config.bcrypt_cost);
        let users = Arc::new(InMemoryUserStore::new());
        users
            .create(sample_user("alice", Role::Staff, &hasher.hash("correct").unwrap()))
            .await
            .unwrap();
        let sessions = SessionManager::new(
            users,
            Arc::new(InMemoryRefreshTokenStore::new()),
            Arc::new(ManualClock::default()),
            &config,
        );

        assert!(matches!(
            sessions.login("alice", "correct").await,
            Err(AppError::Internal(_))
        ));
    }

    #[tokio::test]
    async fn test_refresh_for_disabled_owner_burns_the_token() {
        let h = harness().await;
        let pair = h.sessions.login("alice", "correct").await.unwrap();
        disable(&h.users, "alice").await;

        assert_err!(h.sessions.refresh(&pair.refresh_token).await);
        assert_eq!(
            h.tokens.find_active_by_value(&pair.refresh_token).await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_resolve_bearer() {
        let h = harness().await;
        let pair = h.sessions.login("alice", "correct").await.unwrap();

        let user = h.sessions.resolve_bearer(&pair.access_token).await.unwrap();
        assert_eq!(user.username, "alice");

        assert!(matches!(
            h.sessions.resolve_bearer(&pair.refresh_token).await,
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            h.sessions.resolve_bearer("nope").await,
            Err(AppError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_bearer_after_ttl_fails() {
        let h = harness().await;
        let pair = h.sessions.login("alice", "correct").await.unwrap();

        h.clock.advance(Duration::minutes(15));
        assert!(matches!(
            h.sessions.resolve_bearer(&pair.access_token).await,
            Err(AppError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_bearer_rechecks_disabled_and_deleted() {
        let h = harness().await;
        let pair = h.sessions.login("alice", "correct").await.unwrap();

        disable(&h.users, "alice").await;
        assert!(matches!(
            h.sessions.resolve_bearer(&pair.access_token).await,
            Err(AppError::Unauthorized(_))
        ));

        let alice = h.users.find_by_username("alice").await.unwrap().unwrap();
        assert!(h.users.delete(alice.id, alice.role).await.unwrap());
        assert!(matches!(
            h.sessions.resolve_bearer(&pair.access_token).await,
            Err(AppError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_logout_revokes_and_is_idempotent() {
        let h = harness().await;
        let pair = h.sessions.login("alice", "correct").await.unwrap();

        h.sessions.logout(&pair.refresh_token).await.unwrap();
        h.sessions.logout(&pair.refresh_token).await.unwrap();

        assert!(matches!(
            h.sessions.refresh(&pair.refresh_token).await,
            Err(AppError::InvalidToken)
        ));
        assert!(matches!(
            h.sessions.logout("garbage").await,
            Err(AppError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_logout_type_checked_before_expiry() {
        let h = harness().await;
        let pair = h.sessions.login("alice", "correct").await.unwrap();

        h.clock.advance(Duration::days(8));

        assert!(h.sessions.logout(&pair.refresh_token).await.is_ok());
        assert!(matches!(
            h.sessions.logout(&pair.access_token).await,
            Err(AppError::InvalidToken)
        ));
    }
}
