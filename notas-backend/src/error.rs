//! Error taxonomy shared by the HTTP layer.
//!
//! Domain modules keep their own `thiserror` enums (`AccountError`,
//! `NoteError`, `DbError`, `DeliveryError`); handlers convert them into
//! [`AppError`], which knows how each failure is shown to the user.

use actix_web::http::{header, StatusCode};
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use validator::{ValidationError, ValidationErrors};

use crate::accounts::AccountError;
use crate::db::DbError;
use crate::notes::NoteError;

/// Key used for errors that do not belong to a single field.
pub const NON_FIELD_ERRORS: &str = "__all__";

pub const REQUIRED: &str = "Este campo es obligatorio.";
/// `ValidationError` code of [`not_blank`].
pub const REQUIRED_CODE: &str = "required";
pub const NOT_FOUND_MESSAGE: &str = "Nota no encontrada.";
pub const INVALID_LINK_MESSAGE: &str = "El enlace no es válido, expiró o ya fue utilizado.";
pub const INTERNAL_MESSAGE: &str = "Error interno del servidor.";

/// Per-field validation messages, in the shape forms render them.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has(&self, field: &str) -> bool {
        !self.get(field).is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

/// Field validator for form text that must not be empty once trimmed.
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new(REQUIRED_CODE);
        error.message = Some(Cow::Borrowed(REQUIRED));
        return Err(error);
    }
    Ok(())
}

/// A missing value hides the other complaints about the same field.
impl From<ValidationErrors> for FieldErrors {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields = FieldErrors::new();
        for (field, list) in errors.field_errors() {
            let required = list.iter().any(|e| e.code == REQUIRED_CODE);
            for error in list.iter().filter(|e| !required || e.code == REQUIRED_CODE) {
                match &error.message {
                    Some(message) => fields.add(field, message.to_string()),
                    None => fields.add(field, error.code.to_string()),
                }
            }
        }
        fields
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, messages)| format!("{}: {}", field, messages.join(" ")))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// Failure of one request, mapped onto a response by [`ResponseError`].
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Not logged in: redirect to the landing page instead of erroring.
    #[error("authentication required")]
    Unauthenticated { next: Option<String> },
    /// Missing or foreign note; both look the same from outside.
    #[error("not found")]
    NotFound,
    #[error("validation failed: {0}")]
    Validation(FieldErrors),
    #[error("invalid or expired link")]
    InvalidLink,
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Remember which page the visitor wanted, for the post-login redirect.
    pub fn with_next(self, path: &str) -> Self {
        match self {
            AppError::Unauthenticated { .. } => AppError::Unauthenticated {
                next: Some(path.to_string()),
            },
            other => other,
        }
    }
}

impl From<FieldErrors> for AppError {
    fn from(errors: FieldErrors) -> Self {
        AppError::Validation(errors)
    }
}

impl From<DbError> for AppError {
    fn from(e: DbError) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl From<NoteError> for AppError {
    fn from(e: NoteError) -> Self {
        match e {
            NoteError::Unauthenticated => AppError::Unauthenticated { next: None },
            NoteError::NotFound => AppError::NotFound,
            NoteError::Validation(errors) => AppError::Validation(errors),
            NoteError::Database(e) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<AccountError> for AppError {
    fn from(e: AccountError) -> Self {
        match e {
            AccountError::Validation(errors) => AppError::Validation(errors),
            AccountError::InvalidCredentials => AppError::Validation(FieldErrors::single(
                NON_FIELD_ERRORS,
                crate::accounts::INVALID_CREDENTIALS,
            )),
            AccountError::InvalidLink => AppError::InvalidLink,
            AccountError::Database(e) => AppError::Internal(e.to_string()),
            AccountError::PasswordHash(msg) => AppError::Internal(msg),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated { .. } => StatusCode::SEE_OTHER,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Validation(_) | AppError::InvalidLink => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            AppError::Unauthenticated { next } => {
                let location = match next {
                    Some(path) => format!("/?next={}", urlencoding::encode(path)),
                    None => "/".to_string(),
                };
                HttpResponse::SeeOther()
                    .insert_header((header::LOCATION, location))
                    .finish()
            }
            AppError::NotFound => HttpResponse::NotFound().json(serde_json::json!({
                "error": NOT_FOUND_MESSAGE
            })),
            AppError::Validation(errors) => HttpResponse::BadRequest().json(serde_json::json!({
                "errors": errors
            })),
            AppError::InvalidLink => HttpResponse::BadRequest().json(serde_json::json!({
                "error": INVALID_LINK_MESSAGE
            })),
            AppError::Internal(msg) => {
                log::error!("Request failed: {}", msg);
                HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": INTERNAL_MESSAGE
                }))
            }
        }
    }
}
