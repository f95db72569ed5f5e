use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::not_blank;

/// A note row. Only ever handed out to its owner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Note {
    pub id: i64,
    pub owner_id: i64,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Submitted note form. The owner never comes from here.
///
/// Titles are limited to 500 characters; the body is free text.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct NoteForm {
    #[serde(default, alias = "titulo")]
    #[validate(
        custom = "not_blank",
        length(max = 500, message = "Asegúrese de que este valor tenga como máximo 500 caracteres.")
    )]
    pub title: String,
    #[serde(default, alias = "contenido")]
    pub body: String,
}
