//! Note database operations
//!
//! Every query here is scoped by `owner_id`; there is deliberately no way to
//! load a note by id alone.

use chrono::Duration;
use rusqlite::{params, OptionalExtension, Row, TransactionBehavior};

use super::super::sqlite::{format_ts, get_ts, now};
use super::super::{Database, DbError};
use crate::models::Note;

const NOTE_COLUMNS: &str = "id, owner_id, title, body, created_at, updated_at";

fn note_from_row(row: &Row<'_>) -> rusqlite::Result<Note> {
    Ok(Note {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        title: row.get(2)?,
        body: row.get(3)?,
        created_at: get_ts(row, 4)?,
        updated_at: get_ts(row, 5)?,
    })
}

impl Database {
    pub fn insert_note(&self, owner_id: i64, title: &str, body: &str) -> Result<Note, DbError> {
        let conn = self.conn()?;
        let created_at = now();
        let ts = format_ts(&created_at);

        conn.execute(
            "INSERT INTO notes (owner_id, title, body, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![owner_id, title, body, ts],
        )?;

        Ok(Note {
            id: conn.last_insert_rowid(),
            owner_id,
            title: title.to_string(),
            body: body.to_string(),
            created_at,
            updated_at: created_at,
        })
    }

    /// Notes of one owner, most recently updated first.
    pub fn list_notes_for_owner(&self, owner_id: i64) -> Result<Vec<Note>, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM notes WHERE owner_id = ?1 ORDER BY updated_at DESC, id DESC",
            NOTE_COLUMNS
        ))?;
        let notes = stmt
            .query_map([owner_id], note_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(notes)
    }

    pub fn get_note_for_owner(&self, owner_id: i64, note_id: i64) -> Result<Option<Note>, DbError> {
        let conn = self.conn()?;
        let note = conn
            .query_row(
                &format!("SELECT {} FROM notes WHERE id = ?1 AND owner_id = ?2", NOTE_COLUMNS),
                params![note_id, owner_id],
                note_from_row,
            )
            .optional()?;
        Ok(note)
    }

    /// Overwrite title and body. `None` when the (id, owner) pair matches nothing.
    ///
    /// `updated_at` always moves forward, even when two writes land within
    /// the same microsecond. Concurrent writers are last-write-wins.
    pub fn update_note_for_owner(
        &self,
        owner_id: i64,
        note_id: i64,
        title: &str,
        body: &str,
    ) -> Result<Option<Note>, DbError> {
        let mut conn = self.conn()?;
        // Write lock before the read, so a concurrent commit cannot fail the upgrade.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing = tx
            .query_row(
                &format!("SELECT {} FROM notes WHERE id = ?1 AND owner_id = ?2", NOTE_COLUMNS),
                params![note_id, owner_id],
                note_from_row,
            )
            .optional()?;

        let Some(mut note) = existing else {
            return Ok(None);
        };

        let updated_at = now().max(note.updated_at + Duration::microseconds(1));
        tx.execute(
            "UPDATE notes SET title = ?1, body = ?2, updated_at = ?3 WHERE id = ?4 AND owner_id = ?5",
            params![title, body, format_ts(&updated_at), note_id, owner_id],
        )?;
        tx.commit()?;

        note.title = title.to_string();
        note.body = body.to_string();
        note.updated_at = updated_at;
        Ok(Some(note))
    }

    /// Returns whether a row owned by `owner_id` was removed.
    pub fn delete_note_for_owner(&self, owner_id: i64, note_id: i64) -> Result<bool, DbError> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "DELETE FROM notes WHERE id = ?1 AND owner_id = ?2",
            params![note_id, owner_id],
        )?;
        Ok(rows > 0)
    }
}
