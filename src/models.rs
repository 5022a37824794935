//! Data models and DTOs (Data Transfer Objects)
//!
//! Contains all request/response structures used by the API.

use crate::accounts::{NewUser, UserChanges};
use crate::auth::Role;
use crate::users::User;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::Validate;

static USERNAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_.-]+$").expect("username pattern compiles")
});

/// Generic success response
#[derive(Serialize)]
pub struct SuccessResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> SuccessResponse<T> {
    pub fn with_data(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }
}

/// Message-only response (no data)
#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// OAuth2 password-grant style login form
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[validate(length(min = 3, max = 50, message = "Username must be between 3 and 50 characters"))]
    #[validate(regex(path = *USERNAME_PATTERN, message = "Username may only contain letters, digits, '_', '.' and '-'"))]
    pub username: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(max = 50, message = "First name must be at most 50 characters"))]
    pub first_name: String,
    #[validate(length(max = 50, message = "Last name must be at most 50 characters"))]
    pub last_name: String,
    #[validate(length(min = 6, max = 255, message = "Password must be between 6 and 255 characters"))]
    pub password: String,
    pub role: Option<Role>,
    #[serde(default)]
    pub disabled: bool,
}

impl From<CreateUserRequest> for NewUser {
    fn from(req: CreateUserRequest) -> Self {
        NewUser {
            username: req.username,
            email: req.email,
            first_name: req.first_name,
            last_name: req.last_name,
            password: req.password,
            role: req.role,
            disabled: req.disabled,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[validate(length(max = 50, message = "First name must be at most 50 characters"))]
    pub first_name: Option<String>,
    #[validate(length(max = 50, message = "Last name must be at most 50 characters"))]
    pub last_name: Option<String>,
    #[validate(length(min = 6, max = 255, message = "Password must be between 6 and 255 characters"))]
    pub password: Option<String>,
    pub role: Option<Role>,
    pub disabled: Option<bool>,
}

impl From<UpdateUserRequest> for UserChanges {
    fn from(req: UpdateUserRequest) -> Self {
        UserChanges {
            email: req.email,
            first_name: req.first_name,
            last_name: req.last_name,
            password: req.password,
            role: req.role,
            disabled: req.disabled,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ProfileQuery {
    #[serde(default = "default_detail_level")]
    pub detail_level: u8,
}

fn default_detail_level() -> u8 {
    1
}

/// Current-user profile; fields beyond the name appear with higher detail levels
#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub full_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

impl UserProfile {
    /// `None` for detail levels outside 1..=3
    pub fn at_detail_level(user: &User, level: u8) -> Option<Self> {
        let full_name = user.full_name();
        match level {
            1 => Some(Self {
                username: None,
                email: None,
                full_name,
                role: None,
            }),
            2 => Some(Self {
                username: Some(user.username.clone()),
                email: None,
                full_name,
                role: None,
            }),
            3 => Some(Self {
                username: Some(user.username.clone()),
                email: Some(user.email.clone()),
                full_name,
                role: Some(user.role),
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::tests::sample_user;

    fn create_request(username: &str) -> CreateUserRequest {
        CreateUserRequest {
            username: username.to_string(),
            email: "new@shop.test".to_string(),
            first_name: "New".to_string(),
            last_name: "Hire".to_string(),
            password: "secret1".to_string(),
            role: None,
            disabled: false,
        }
    }

    #[test]
    fn test_create_user_validation() {
        assert!(create_request("new.hire").validate().is_ok());
        assert!(create_request("ab").validate().is_err());
        assert!(create_request("has space").validate().is_err());

        let mut bad_email = create_request("new.hire");
        bad_email.email = "not-an-email".to_string();
        assert!(bad_email.validate().is_err());

        let mut short_password = create_request("new.hire");
        short_password.password = "12345".to_string();
        assert!(short_password.validate().is_err());
    }

    #[test]
    fn test_update_user_validation_skips_missing_fields() {
        assert!(UpdateUserRequest::default().validate().is_ok());

        let bad = UpdateUserRequest {
            password: Some("123".to_string()),
            ..UpdateUserRequest::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_profile_detail_levels() {
        let user = sample_user("alice", Role::Staff, "h");

        let basic = UserProfile::at_detail_level(&user, 1).unwrap();
        assert_eq!(basic.username, None);
        assert_eq!(basic.full_name, "alice Tester");

        let full = UserProfile::at_detail_level(&user, 3).unwrap();
        assert_eq!(full.role, Some(Role::Staff));
        assert_eq!(full.email.as_deref(), Some("alice@shop.test"));

        assert!(UserProfile::at_detail_level(&user, 0).is_none());
        assert!(UserProfile::at_detail_level(&user, 4).is_none());
    }
}
