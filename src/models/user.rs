//! User model and request identity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::validation::{validate_email, validate_password_plaintext, Validator};

/// User entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub activated: bool,
    #[serde(skip_serializing, default)]
    pub version: i32,
}

impl User {
    /// Unsaved user; `id` and `version` are assigned on insert
    pub fn new(name: String, email: String, password_hash: String) -> Self {
        Self {
            id: 0,
            created_at: Utc::now(),
            name,
            email,
            password_hash,
            activated: false,
            version: 1,
        }
    }
}

/// Who is making the current request.
///
/// Exactly one identity is bound per request by the authentication layer and
/// it is read-only afterwards. `Anonymous` is the single sentinel for "no
/// credential presented" and can never collide with a stored user.
#[derive(Debug, Clone, PartialEq)]
pub enum Identity {
    Anonymous,
    User(User),
}

impl Identity {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Identity::Anonymous)
    }

    /// 0 for the anonymous sentinel
    pub fn user_id(&self) -> i64 {
        match self {
            Identity::Anonymous => 0,
            Identity::User(user) => user.id,
        }
    }

    pub fn email(&self) -> Option<&str> {
        match self {
            Identity::Anonymous => None,
            Identity::User(user) => Some(&user.email),
        }
    }

    pub fn is_activated(&self) -> bool {
        match self {
            Identity::Anonymous => false,
            Identity::User(user) => user.activated,
        }
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Identity::Anonymous => None,
            Identity::User(user) => Some(user),
        }
    }
}

impl From<User> for Identity {
    fn from(user: User) -> Self {
        Identity::User(user)
    }
}

/// Registration request body
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterUserRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl RegisterUserRequest {
    pub fn validate(&self, v: &mut Validator) {
        v.check(!self.name.is_empty(), "name", "must be provided");
        v.check(self.name.len() <= 500, "name", "must not be more than 500 bytes long");
        validate_email(v, &self.email);
        validate_password_plaintext(v, &self.password);
    }
}
