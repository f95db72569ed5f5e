//! Note CRUD over the database.

use std::sync::Arc;

use validator::Validate;

use super::{DeleteOutcome, NoteError};
use crate::db::Database;
use crate::models::{Note, NoteForm, Session};

/// Cleaned note fields.
#[derive(Debug, Clone, PartialEq, Eq)]
struct CleanNote {
    title: String,
    body: String,
}

fn clean(form: &NoteForm) -> Result<CleanNote, NoteError> {
    let trimmed = NoteForm {
        title: form.title.trim().to_string(),
        body: form.body.trim().to_string(),
    };
    trimmed.validate().map_err(|e| NoteError::Validation(e.into()))?;

    Ok(CleanNote {
        title: trimmed.title,
        body: trimmed.body,
    })
}

fn owner_id(session: &Session) -> Result<i64, NoteError> {
    session.user_id.ok_or(NoteError::Unauthenticated)
}

pub struct NoteStore {
    db: Arc<Database>,
}

impl NoteStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// The session user's notes, most recently updated first.
    pub fn list(&self, session: &Session) -> Result<Vec<Note>, NoteError> {
        let owner = owner_id(session)?;
        Ok(self.db.list_notes_for_owner(owner)?)
    }

    pub fn get(&self, session: &Session, note_id: i64) -> Result<Note, NoteError> {
        let owner = owner_id(session)?;
        self.db
            .get_note_for_owner(owner, note_id)?
            .ok_or(NoteError::NotFound)
    }

    pub fn create(&self, session: &Session, form: &NoteForm) -> Result<Note, NoteError> {
        let owner = owner_id(session)?;
        let note = clean(form)?;
        let created = self.db.insert_note(owner, &note.title, &note.body)?;
        log::info!("[NOTES] User {} created note {}", owner, created.id);
        Ok(created)
    }

    /// Overwrite a note. Ownership is checked before the form is validated.
    pub fn update(&self, session: &Session, note_id: i64, form: &NoteForm) -> Result<Note, NoteError> {
        let owner = owner_id(session)?;
        if self.db.get_note_for_owner(owner, note_id)?.is_none() {
            return Err(NoteError::NotFound);
        }
        let note = clean(form)?;
        let updated = self
            .db
            .update_note_for_owner(owner, note_id, &note.title, &note.body)?
            .ok_or(NoteError::NotFound)?;
        log::info!("[NOTES] User {} updated note {}", owner, note_id);
        Ok(updated)
    }

    /// Two-step delete: unconfirmed requests only return the note to confirm.
    pub fn delete(&self, session: &Session, note_id: i64, confirmed: bool) -> Result<DeleteOutcome, NoteError> {
        let owner = owner_id(session)?;
        if !confirmed {
            let note = self.get(session, note_id)?;
            return Ok(DeleteOutcome::ConfirmationRequired(note));
        }
        if !self.db.delete_note_for_owner(owner, note_id)? {
            return Err(NoteError::NotFound);
        }
        log::info!("[NOTES] User {} deleted note {}", owner, note_id);
        Ok(DeleteOutcome::Deleted)
    }
}
