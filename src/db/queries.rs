//! SQL query constants
//!
//! Contains all SQL queries used by the application.

pub const CREATE_USERS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        username VARCHAR(50) UNIQUE NOT NULL,
        email VARCHAR(100) UNIQUE NOT NULL,
        first_name VARCHAR(50) NOT NULL DEFAULT '',
        last_name VARCHAR(50) NOT NULL DEFAULT '',
        password_hash VARCHAR(255) NOT NULL,
        role VARCHAR(16) NOT NULL CHECK (role IN ('owner', 'manager', 'staff')),
        disabled BOOLEAN NOT NULL DEFAULT FALSE,
        last_login TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    );
"#;

pub const CREATE_REFRESH_TOKENS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS refresh_tokens (
        id UUID PRIMARY KEY,
        token TEXT UNIQUE NOT NULL,
        user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        created_at TIMESTAMPTZ NOT NULL,
        expires_at TIMESTAMPTZ NOT NULL,
        revoked BOOLEAN NOT NULL DEFAULT FALSE
    );
    CREATE INDEX IF NOT EXISTS idx_refresh_tokens_user_id ON refresh_tokens(user_id);
"#;

const USER_COLUMNS: &str =
    "id, username, email, first_name, last_name, password_hash, role, disabled, last_login, created_at";

pub fn select_user_by_username() -> String {
    format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1")
}

pub fn select_user_by_id() -> String {
    format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1")
}

pub fn select_all_users() -> String {
    format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at, username")
}

pub const INSERT_USER: &str = r#"
    INSERT INTO users (id, username, email, first_name, last_name, password_hash, role, disabled, last_login, created_at)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
"#;

/// Writes only the patched columns, and only while the role is still `$2`
pub fn update_user_if_role() -> String {
    format!(
        r#"
    UPDATE users
    SET email = COALESCE($3, email),
        first_name = COALESCE($4, first_name),
        last_name = COALESCE($5, last_name),
        password_hash = COALESCE($6, password_hash),
        role = COALESCE($7, role),
        disabled = COALESCE($8, disabled)
    WHERE id = $1 AND role = $2
    RETURNING {USER_COLUMNS}
"#
    )
}

pub const DELETE_USER_IF_ROLE: &str = "DELETE FROM users WHERE id = $1 AND role = $2";

pub const USER_EXISTS: &str = "SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)";

pub const EXISTS_USER_WITH_ROLE: &str =
    "SELECT EXISTS (SELECT 1 FROM users WHERE role = $1)";

pub const TOUCH_LAST_LOGIN: &str = "UPDATE users SET last_login = $2 WHERE id = $1";

pub const INSERT_REFRESH_TOKEN: &str = r#"
    INSERT INTO refresh_tokens (id, token, user_id, created_at, expires_at, revoked)
    VALUES ($1, $2, $3, $4, $5, FALSE)
"#;

pub const SELECT_ACTIVE_REFRESH_TOKEN: &str = r#"
    SELECT id, token, user_id, created_at, expires_at, revoked
    FROM refresh_tokens
    WHERE token = $1 AND revoked = FALSE
"#;

/// Compare-and-set: affects one row only for the caller that wins
pub const REVOKE_REFRESH_TOKEN: &str =
    "UPDATE refresh_tokens SET revoked = TRUE WHERE id = $1 AND revoked = FALSE";

pub const DELETE_REFRESH_TOKENS_FOR_USER: &str = "DELETE FROM refresh_tokens WHERE user_id = $1";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_queries_share_column_list() {
        for query in [select_user_by_username(), select_user_by_id(), select_all_users()] {
            assert!(query.starts_with("SELECT id, username, email"));
            assert!(query.contains("created_at FROM users"));
        }
    }

    #[test]
    fn test_update_is_guarded_by_role_and_leaves_last_login() {
        let query = update_user_if_role();
        assert!(query.contains("WHERE id = $1 AND role = $2"));
        assert!(query.contains(&format!("RETURNING {USER_COLUMNS}")));
        assert!(!query.contains("last_login = "));
        assert!(!query.contains("username = "));
    }
}
