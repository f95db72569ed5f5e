//! Personal notes, always scoped to the session's user.
//!
//! There is no code path that reads or writes a note without the owner id
//! taken from the [`Session`](crate::models::Session); a note that belongs to
//! someone else is indistinguishable from one that does not exist.

pub mod store;

pub use store::NoteStore;

use crate::db::DbError;
use crate::error::FieldErrors;
use crate::models::Note;

#[derive(Debug, thiserror::Error)]
pub enum NoteError {
    #[error("authentication required")]
    Unauthenticated,
    #[error("note not found")]
    NotFound,
    #[error("validation failed: {0}")]
    Validation(FieldErrors),
    #[error(transparent)]
    Database(#[from] DbError),
}

/// What a delete request did.
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteOutcome {
    /// First step: nothing was removed, the caller must confirm.
    ConfirmationRequired(Note),
    Deleted,
}
