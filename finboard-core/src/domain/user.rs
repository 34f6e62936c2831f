//! User domain model

use serde::{Deserialize, Serialize};

use super::Id;

/// Represents an authenticated user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Id,
    pub username: String,
    /// Argon2id hash, never serialized
    #[serde(skip_serializing, default)]
    pub password_hash: String,
}

/// A user row before the store assigns its id
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
}

impl NewUser {
    pub fn new(username: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password_hash: password_hash.into(),
        }
    }

    /// Normalize the username: surrounding whitespace is not significant
    pub fn normalize_username(username: &str) -> String {
        username.trim().to_string()
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.username.trim().is_empty() {
            return Err("username cannot be empty");
        }
        if self.password_hash.is_empty() {
            return Err("password hash cannot be empty");
        }
        Ok(())
    }

    pub fn with_id(self, id: Id) -> User {
        User {
            id,
            username: self.username,
            password_hash: self.password_hash,
        }
    }
}
