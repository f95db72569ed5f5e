//! User database operations

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::super::sqlite::{format_ts, get_opt_ts, get_ts, map_unique_violation, now};
use super::super::{Database, DbError};
use crate::models::User;

const USER_COLUMNS: &str =
    "id, username, email, password_hash, is_active, last_login, date_joined";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        is_active: row.get(4)?,
        last_login: get_opt_ts(row, 5)?,
        date_joined: get_ts(row, 6)?,
    })
}

impl Database {
    /// Insert a new, inactive user.
    ///
    /// A clash on username or email (case-insensitive) comes back as
    /// [`DbError::Conflict`] naming the column.
    pub fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, DbError> {
        let conn = self.conn()?;
        let date_joined = now();

        conn.execute(
            "INSERT INTO users (username, email, password_hash, is_active, date_joined)
             VALUES (?1, ?2, ?3, 0, ?4)",
            params![username, email, password_hash, format_ts(&date_joined)],
        )
        .map_err(map_unique_violation)?;

        Ok(User {
            id: conn.last_insert_rowid(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            is_active: false,
            last_login: None,
            date_joined,
        })
    }

    pub fn get_user(&self, id: i64) -> Result<Option<User>, DbError> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                [id],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    /// Exact (case-sensitive) username lookup, as used by login.
    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>, DbError> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS),
                [username],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    /// Users bound to an email address, compared case-insensitively.
    pub fn find_users_by_email(&self, email: &str) -> Result<Vec<User>, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM users WHERE email = ?1 COLLATE NOCASE ORDER BY id",
            USER_COLUMNS
        ))?;
        let users = stmt
            .query_map([email], user_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }

    pub fn username_exists(&self, username: &str) -> Result<bool, DbError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE username = ?1",
            [username],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn email_exists(&self, email: &str) -> Result<bool, DbError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE email = ?1 COLLATE NOCASE",
            [email],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Flip a pending user to active. Returns false if the user was already
    /// active (or does not exist), so activation happens at most once.
    pub fn set_user_active(&self, id: i64) -> Result<bool, DbError> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "UPDATE users SET is_active = 1 WHERE id = ?1 AND is_active = 0",
            [id],
        )?;
        Ok(rows > 0)
    }

    pub fn set_password_hash(&self, id: i64, password_hash: &str) -> Result<(), DbError> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE users SET password_hash = ?1 WHERE id = ?2",
            params![password_hash, id],
        )?;
        Ok(())
    }

    pub fn touch_last_login(&self, id: i64, at: &DateTime<Utc>) -> Result<(), DbError> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE users SET last_login = ?1 WHERE id = ?2",
            params![format_ts(at), id],
        )?;
        Ok(())
    }
}
