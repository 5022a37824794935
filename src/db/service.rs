// Postgres-backed user and refresh token stores
//
// Implements the store traits over a deadpool connection pool.

use super::queries;
use crate::auth::{RefreshTokenRecord, RefreshTokenStore, Role};
use crate::error::{conflict_error, not_found_error, AppError};
use crate::users::{User, UserPatch, UserStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::{Client, Pool};
use tokio_postgres::error::SqlState;
use tokio_postgres::Row;
use uuid::Uuid;

// Map a unique violation to a conflict, everything else passes through
fn map_write_error(e: tokio_postgres::Error, conflict: &str) -> AppError {
    if e.code() == Some(&SqlState::UNIQUE_VIOLATION) {
        conflict_error(conflict)
    } else {
        AppError::Database(e)
    }
}

fn user_from_row(row: &Row) -> Result<User, AppError> {
    let role: String = row.get("role");
    let role = role
        .parse::<Role>()
        .map_err(|e| AppError::Internal(format!("Corrupt user row: {}", e)))?;

    Ok(User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        password_hash: row.get("password_hash"),
        role,
        disabled: row.get("disabled"),
        last_login: row.get("last_login"),
        created_at: row.get("created_at"),
    })
}

fn token_from_row(row: &Row) -> RefreshTokenRecord {
    RefreshTokenRecord {
        id: row.get("id"),
        token: row.get("token"),
        user_id: row.get("user_id"),
        created_at: row.get("created_at"),
        expires_at: row.get("expires_at"),
        revoked: row.get("revoked"),
    }
}

// User store for database operations
pub struct PgUserStore {
    pool: Pool,
}

impl PgUserStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(&queries::select_user_by_username(), &[&username])
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let client = self.pool.get().await?;
        let row = client.query_opt(&queries::select_user_by_id(), &[&id]).await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn create(&self, user: User) -> Result<User, AppError> {
        let client = self.pool.get().await?;
        client
            .execute(
                queries::INSERT_USER,
                &[
                    &user.id,
                    &user.username,
                    &user.email,
                    &user.first_name,
                    &user.last_name,
                    &user.password_hash,
                    &user.role.as_str(),
                    &user.disabled,
                    &user.last_login,
                    &user.created_at,
                ],
            )
            .await
            .map_err(|e| map_write_error(e, "Username or Email already registered"))?;

        Ok(user)
    }

    async fn update(
        &self,
        id: Uuid,
        expected_role: Role,
        patch: &UserPatch,
    ) -> Result<Option<User>, AppError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &queries::update_user_if_role(),
                &[
                    &id,
                    &expected_role.as_str(),
                    &patch.email,
                    &patch.first_name,
                    &patch.last_name,
                    &patch.password_hash,
                    &patch.role.map(|r| r.as_str()),
                    &patch.disabled,
                ],
            )
            .await
            .map_err(|e| map_write_error(e, "Email already in use"))?;

        match row {
            Some(row) => user_from_row(&row).map(Some),
            None => {
                ensure_exists(&client, id).await?;
                Ok(None)
            }
        }
    }

    async fn delete(&self, id: Uuid, expected_role: Role) -> Result<bool, AppError> {
        let client = self.pool.get().await?;
        let deleted = client
            .execute(queries::DELETE_USER_IF_ROLE, &[&id, &expected_role.as_str()])
            .await?;
        if deleted == 1 {
            return Ok(true);
        }
        ensure_exists(&client, id).await?;
        Ok(false)
    }

    async fn list(&self) -> Result<Vec<User>, AppError> {
        let client = self.pool.get().await?;
        let rows = client.query(&queries::select_all_users(), &[]).await?;
        rows.iter().map(user_from_row).collect()
    }

    async fn exists_with_role(&self, role: Role) -> Result<bool, AppError> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(queries::EXISTS_USER_WITH_ROLE, &[&role.as_str()])
            .await?;
        Ok(row.get(0))
    }

    async fn touch_last_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), AppError> {
        let client = self.pool.get().await?;
        let updated = client.execute(queries::TOUCH_LAST_LOGIN, &[&id, &at]).await?;
        if updated == 0 {
            return Err(not_found_error("User not found"));
        }
        Ok(())
    }
}

// A guarded write matched no row: `NotFound` if the user is gone, otherwise
// the role moved and the caller decides again.
async fn ensure_exists(client: &Client, id: Uuid) -> Result<(), AppError> {
    let row = client.query_one(queries::USER_EXISTS, &[&id]).await?;
    let exists: bool = row.get(0);
    if exists {
        Ok(())
    } else {
        Err(not_found_error("User not found"))
    }
}

// Refresh token store for database operations
pub struct PgRefreshTokenStore {
    pool: Pool,
}

impl PgRefreshTokenStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefreshTokenStore for PgRefreshTokenStore {
    async fn create(
        &self,
        user_id: Uuid,
        token: &str,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshTokenRecord, AppError> {
        let client = self.pool.get().await?;
        let record = RefreshTokenRecord {
            id: Uuid::new_v4(),
            token: token.to_string(),
            user_id,
            created_at: issued_at,
            expires_at,
            revoked: false,
        };

        client
            .execute(
                queries::INSERT_REFRESH_TOKEN,
                &[
                    &record.id,
                    &record.token,
                    &record.user_id,
                    &record.created_at,
                    &record.expires_at,
                ],
            )
            .await
            .map_err(|e| map_write_error(e, "Refresh token already recorded"))?;

        Ok(record)
    }

    async fn find_active_by_value(&self, token: &str) -> Result<Option<RefreshTokenRecord>, AppError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(queries::SELECT_ACTIVE_REFRESH_TOKEN, &[&token])
            .await?;
        Ok(row.as_ref().map(token_from_row))
    }

    async fn revoke(&self, record: &RefreshTokenRecord) -> Result<bool, AppError> {
        let client = self.pool.get().await?;
        let updated = client
            .execute(queries::REVOKE_REFRESH_TOKEN, &[&record.id])
            .await?;
        Ok(updated == 1)
    }

    async fn delete_all_for_user(&self, user_id: Uuid) -> Result<u64, AppError> {
        let client = self.pool.get().await?;
        let deleted = client
            .execute(queries::DELETE_REFRESH_TOKENS_FOR_USER, &[&user_id])
            .await?;
        Ok(deleted)
    }
}
