//! Submitted account forms and their field-level cleaning.
//!
//! Cleaning here covers only what can be checked without the database;
//! uniqueness is checked by the workflows.

use serde::Deserialize;
use std::borrow::Cow;
use validator::{Validate, ValidationError};

use super::password::validate_new_password;
use crate::error::{not_blank, FieldErrors};

pub const USERNAME_INVALID: &str =
    "Introduzca un nombre de usuario válido. Solo puede contener letras, números y los caracteres @/./+/-/_.";

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct RegistrationForm {
    #[serde(default)]
    #[validate(
        custom = "username_chars",
        length(max = 150, message = "Asegúrese de que este valor tenga como máximo 150 caracteres.")
    )]
    pub username: String,
    #[serde(default)]
    #[validate(
        custom = "not_blank",
        email(message = "Introduzca una dirección de correo electrónico válida.")
    )]
    pub email: String,
    #[serde(default)]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
}

/// Registration data that passed every field rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanRegistration {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl RegistrationForm {
    pub fn clean(&self) -> Result<CleanRegistration, FieldErrors> {
        let form = RegistrationForm {
            username: self.username.trim().to_string(),
            email: self.email.trim().to_string(),
            ..self.clone()
        };
        let mut errors = field_errors(&form);

        validate_new_password(&form.password1, &form.password2, &form.username, "password2", &mut errors);

        errors.into_result()?;
        Ok(CleanRegistration {
            email: normalize_email(&form.email),
            username: form.username,
            password: form.password1,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct LoginForm {
    #[serde(default)]
    #[validate(custom = "not_blank")]
    pub username: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Este campo es obligatorio."))]
    pub password: String,
    /// Page to return to after login. Only local paths are honoured.
    #[serde(default)]
    pub next: Option<String>,
}

impl LoginForm {
    pub fn clean(&self) -> Result<(), FieldErrors> {
        field_errors(self).into_result()
    }
}

/// Single-field form used by the resend and password-reset requests.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct EmailForm {
    #[serde(default)]
    #[validate(
        custom = "not_blank",
        email(message = "Introduzca una dirección de correo electrónico válida.")
    )]
    pub email: String,
}

impl EmailForm {
    pub fn clean(&self) -> Result<String, FieldErrors> {
        let form = EmailForm {
            email: self.email.trim().to_string(),
        };
        field_errors(&form).into_result()?;
        Ok(normalize_email(&form.email))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SetPasswordForm {
    #[serde(default)]
    pub new_password1: String,
    #[serde(default)]
    pub new_password2: String,
}

impl SetPasswordForm {
    pub fn clean(&self, username: &str) -> Result<String, FieldErrors> {
        let mut errors = FieldErrors::new();
        validate_new_password(
            &self.new_password1,
            &self.new_password2,
            username,
            "new_password2",
            &mut errors,
        );
        errors.into_result()?;
        Ok(self.new_password1.clone())
    }
}

fn field_errors<T: Validate>(form: &T) -> FieldErrors {
    form.validate().err().map(FieldErrors::from).unwrap_or_default()
}

fn username_chars(username: &str) -> Result<(), ValidationError> {
    not_blank(username)?;
    let allowed = |c: char| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_');
    if username.chars().all(allowed) {
        Ok(())
    } else {
        let mut error = ValidationError::new("username");
        error.message = Some(Cow::Borrowed(USERNAME_INVALID));
        Err(error)
    }
}

/// Lowercase the domain part of an already validated address.
pub fn normalize_email(email: &str) -> String {
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{}@{}", local, domain.to_lowercase()),
        None => email.to_string(),
    }
}

/// Accept only same-site absolute paths as redirect targets.
pub fn safe_next(next: Option<&str>) -> Option<String> {
    let next = next?.trim();
    if next.starts_with('/') && !next.starts_with("//") && !next.contains('\\') {
        Some(next.to_string())
    } else {
        None
    }
}
