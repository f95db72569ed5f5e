//! Auth session database operations

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use super::super::sqlite::{format_ts, get_ts, now};
use super::super::{Database, DbError};
use crate::models::AuthSession;

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<AuthSession> {
    Ok(AuthSession {
        id: row.get(0)?,
        token: row.get(1)?,
        user_id: row.get(2)?,
        created_at: get_ts(row, 3)?,
        expires_at: get_ts(row, 4)?,
    })
}

impl Database {
    /// Create a new login session for `user_id`.
    pub fn create_session(&self, user_id: i64, ttl: Duration) -> Result<AuthSession, DbError> {
        let conn = self.conn()?;
        let token = Uuid::new_v4().to_string();
        let created_at = now();
        let expires_at = created_at + ttl;

        conn.execute(
            "INSERT INTO auth_sessions (token, user_id, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![token, user_id, format_ts(&created_at), format_ts(&expires_at)],
        )?;

        Ok(AuthSession {
            id: conn.last_insert_rowid(),
            token,
            user_id,
            created_at,
            expires_at,
        })
    }

    /// Validate a session token and extend its expiry if valid
    pub fn validate_session(&self, token: &str, ttl: Duration) -> Result<Option<AuthSession>, DbError> {
        self.validate_session_at(token, ttl, now())
    }

    pub(crate) fn validate_session_at(
        &self,
        token: &str,
        ttl: Duration,
        at: DateTime<Utc>,
    ) -> Result<Option<AuthSession>, DbError> {
        let conn = self.conn()?;

        let session = conn
            .query_row(
                "SELECT id, token, user_id, created_at, expires_at
                 FROM auth_sessions WHERE token = ?1 AND expires_at > ?2",
                params![token, format_ts(&at)],
                session_from_row,
            )
            .optional()?;

        // Sliding expiry: every authenticated request keeps the session alive
        let Some(mut session) = session else {
            return Ok(None);
        };
        let new_expires = at + ttl;
        conn.execute(
            "UPDATE auth_sessions SET expires_at = ?1 WHERE id = ?2",
            params![format_ts(&new_expires), session.id],
        )?;
        session.expires_at = new_expires;

        Ok(Some(session))
    }

    /// Delete a session (logout)
    pub fn delete_session(&self, token: &str) -> Result<bool, DbError> {
        let conn = self.conn()?;
        let rows_affected = conn.execute("DELETE FROM auth_sessions WHERE token = ?1", [token])?;
        Ok(rows_affected > 0)
    }

    /// Drop every session of a user, e.g. after a password change.
    pub fn delete_sessions_for_user(&self, user_id: i64) -> Result<usize, DbError> {
        let conn = self.conn()?;
        let rows = conn.execute("DELETE FROM auth_sessions WHERE user_id = ?1", [user_id])?;
        Ok(rows)
    }

    pub fn purge_expired_sessions(&self) -> Result<usize, DbError> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "DELETE FROM auth_sessions WHERE expires_at <= ?1",
            [format_ts(&now())],
        )?;
        if rows > 0 {
            log::info!("[DB] Purged {} expired sessions", rows);
        }
        Ok(rows)
    }
}
