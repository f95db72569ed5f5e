//! SQLite connection pool and schema.
//!
//! Tables are created idempotently on open. Timestamps are stored as RFC 3339
//! strings with fixed microsecond precision so that text ordering matches
//! chronological ordering.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Type;
use rusqlite::{ErrorCode, Row};
use std::path::Path;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    /// A UNIQUE constraint rejected the write; holds the `table.column` SQLite reported.
    #[error("unique constraint failed on {0}")]
    Conflict(String),
}

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 0,
        last_login TEXT,
        date_joined TEXT NOT NULL
    );

    CREATE UNIQUE INDEX IF NOT EXISTS idx_users_email ON users (email COLLATE NOCASE);

    CREATE TABLE IF NOT EXISTS notes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        owner_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        title TEXT NOT NULL,
        body TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_notes_owner_updated ON notes (owner_id, updated_at DESC);

    CREATE TABLE IF NOT EXISTS auth_sessions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        token TEXT NOT NULL UNIQUE,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        created_at TEXT NOT NULL,
        expires_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_auth_sessions_user ON auth_sessions (user_id);
";

/// Pooled handle to the application database.
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Open (or create) the database file and make sure the schema exists.
    pub fn new(database_url: &str) -> Result<Self, DbError> {
        if let Some(parent) = Path::new(database_url).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).ok();
            }
        }

        let manager = SqliteConnectionManager::file(database_url).with_init(|conn| {
            conn.execute_batch(
                "PRAGMA foreign_keys = ON;
                 PRAGMA journal_mode = WAL;
                 PRAGMA busy_timeout = 5000;",
            )
        });
        let pool = Pool::builder().max_size(8).build(manager)?;

        let db = Self { pool };
        db.init_schema()?;
        Ok(db)
    }

    /// Single-connection in-memory database. Every checkout sees the same data.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let manager = SqliteConnectionManager::memory()
            .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
        let pool = Pool::builder().max_size(1).build(manager)?;

        let db = Self { pool };
        db.init_schema()?;
        Ok(db)
    }

    pub fn conn(&self) -> Result<DbConn, DbError> {
        Ok(self.pool.get()?)
    }

    fn init_schema(&self) -> Result<(), DbError> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA)?;
        log::debug!("[DB] Schema ready");
        Ok(())
    }
}

/// Current time at the precision the database keeps.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

pub fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub fn get_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_ts(idx, &raw)
}

pub fn get_opt_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| parse_ts(idx, &s)).transpose()
}

/// Turn a UNIQUE violation into [`DbError::Conflict`], pass everything else through.
pub fn map_unique_violation(err: rusqlite::Error) -> DbError {
    if let rusqlite::Error::SqliteFailure(ref failure, Some(ref msg)) = err {
        if failure.code == ErrorCode::ConstraintViolation {
            if let Some(column) = msg.strip_prefix("UNIQUE constraint failed: ") {
                return DbError::Conflict(column.trim().to_string());
            }
        }
    }
    DbError::Sqlite(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_creates_parent_dirs_and_schema() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("notas.db");

        let db = Database::new(path.to_str().unwrap()).expect("Failed to open database");
        assert!(path.exists());

        let conn = db.conn().unwrap();
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('users', 'notes', 'auth_sessions')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 3);
    }

    #[test]
    fn test_reopen_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notas.db");

        Database::new(path.to_str().unwrap()).expect("first open");
        Database::new(path.to_str().unwrap()).expect("second open");
    }

    #[test]
    fn test_foreign_keys_enforced() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.conn().unwrap();
        let ts = format_ts(&now());
        let result = conn.execute(
            "INSERT INTO notes (owner_id, title, body, created_at, updated_at) VALUES (999, 't', '', ?1, ?1)",
            [&ts],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_timestamp_text_roundtrip_keeps_micros() {
        let ts = now();
        let text = format_ts(&ts);
        assert!(text.ends_with('Z'));
        assert_eq!(parse_ts(0, &text).unwrap(), ts);
    }
}
