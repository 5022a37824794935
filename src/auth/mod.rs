//! Authentication and authorization module
//!
//! Token lifecycle (issue, rotate, revoke, resolve) plus the role policy
//! consulted by every protected operation.

mod authenticator;
mod jwt;
mod middleware;
mod password;
mod policy;
mod session;
mod token_store;

pub use authenticator::Authenticator;
pub use jwt::{Claims, TokenCodec, TokenError, TokenPair, TokenType};
pub use middleware::{require_auth, CurrentUser};
pub use password::PasswordHasher;
pub use policy::{authorize, can_perform, resolve_created_role, Action};
pub use session::SessionManager;
pub use token_store::{InMemoryRefreshTokenStore, RefreshTokenRecord, RefreshTokenStore};

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Staff roles, declared in ascending order of authority: owner > manager > staff
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Day-to-day store staff; no administrative rights
    #[default]
    Staff,
    /// Can manage staff accounts
    Manager,
    /// Full control, including the supermarket record itself
    Owner,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Staff, Role::Manager, Role::Owner];

    /// Strictly higher authority than `other`
    pub fn outranks(self, other: Role) -> bool {
        self > other
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Staff => "staff",
            Role::Manager => "manager",
            Role::Owner => "owner",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "staff" => Ok(Role::Staff),
            "manager" => Ok(Role::Manager),
            "owner" => Ok(Role::Owner),
            other => Err(format!("Unknown role '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_authority_order() {
        assert!(Role::Owner.outranks(Role::Manager));
        assert!(Role::Manager.outranks(Role::Staff));
        assert!(Role::Owner.outranks(Role::Staff));
        assert!(!Role::Manager.outranks(Role::Manager));
        assert!(!Role::Staff.outranks(Role::Owner));
    }

    #[test]
    fn test_default_role_is_least_privileged() {
        assert_eq!(Role::default(), Role::Staff);
        assert!(Role::ALL.iter().all(|r| *r >= Role::default()));
    }

    #[test]
    fn test_role_round_trips_through_text() {
        for role in Role::ALL {
            assert_eq!(role.to_string().parse::<Role>(), Ok(role));
        }
        assert_eq!(" Manager ".parse::<Role>(), Ok(Role::Manager));
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_serde_is_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Owner).unwrap(), "\"owner\"");
        let role: Role = serde_json::from_str("\"staff\"").unwrap();
        assert_eq!(role, Role::Staff);
    }
}
