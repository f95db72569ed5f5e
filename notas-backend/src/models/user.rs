use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Full user record from the `users` table.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    /// Argon2id PHC string.
    pub password_hash: String,
    /// False until the activation link is redeemed.
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub date_joined: DateTime<Utc>,
}

impl User {
    pub fn to_info(&self) -> UserInfo {
        UserInfo {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            is_active: self.is_active,
        }
    }
}

/// User fields safe to return to the client (never the password hash).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserInfo {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub is_active: bool,
}
