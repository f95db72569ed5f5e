use chrono::{DateTime, Utc};

/// Row of the `auth_sessions` table.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: i64,
    pub token: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Who is making the current request.
///
/// Built once per request from the session cookie and passed explicitly into
/// every workflow call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub token: Option<String>,
    pub user_id: Option<i64>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(token: impl Into<String>, user_id: i64) -> Self {
        Self {
            token: Some(token.into()),
            user_id: Some(user_id),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }
}

impl From<&AuthSession> for Session {
    fn from(row: &AuthSession) -> Self {
        Session::authenticated(row.token.clone(), row.user_id)
    }
}
