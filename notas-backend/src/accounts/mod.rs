//! User accounts: registration with emailed activation, login sessions and
//! password reset.
//!
//! A user is created inactive (`Pending`) and becomes `Active` exactly once,
//! by redeeming the signed link sent to their email address.

mod activation;
pub mod forms;
mod login;
pub mod password;
mod password_reset;

use chrono::Duration;
use serde::Serialize;
use std::sync::Arc;

use crate::config::Config;
use crate::db::{Database, DbError};
use crate::error::FieldErrors;
use crate::mailer::{EmailMessage, Mailer};
use crate::models::{Session, User, UserInfo};
use crate::tokens::TokenGenerator;

pub use login::LoggedIn;

pub const INVALID_CREDENTIALS: &str =
    "Introduzca un nombre de usuario y contraseña correctos. Tenga en cuenta que la cuenta debe estar activada.";
pub const DUPLICATE_EMAIL: &str = "Ya existe una cuenta con este correo electrónico.";
pub const USERNAME_TAKEN: &str = "Ya existe un usuario con este nombre.";

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("validation failed: {0}")]
    Validation(FieldErrors),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("invalid or expired link")]
    InvalidLink,
    #[error(transparent)]
    Database(#[from] DbError),
    #[error("{0}")]
    PasswordHash(String),
}

impl From<FieldErrors> for AccountError {
    fn from(errors: FieldErrors) -> Self {
        AccountError::Validation(errors)
    }
}

/// Result of a successful registration.
#[derive(Debug, Clone, Serialize)]
pub struct PendingUser {
    pub user: UserInfo,
    /// False when the activation email could not be handed to the mailer.
    pub activation_email_sent: bool,
}

/// Account workflows over the shared database and mailer.
pub struct Accounts {
    db: Arc<Database>,
    mailer: Arc<dyn Mailer>,
    activation_tokens: TokenGenerator,
    reset_tokens: TokenGenerator,
    public_url: String,
    mail_from: String,
    session_ttl: Duration,
}

impl Accounts {
    pub fn new(db: Arc<Database>, mailer: Arc<dyn Mailer>, config: &Config) -> Self {
        Self {
            db,
            mailer,
            activation_tokens: TokenGenerator::activation(config),
            reset_tokens: TokenGenerator::password_reset(config),
            public_url: config.public_url.clone(),
            mail_from: config.mail_from.clone(),
            session_ttl: config.session_ttl(),
        }
    }

    pub fn mailer_name(&self) -> &'static str {
        self.mailer.name()
    }

    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    /// The logged-in user behind a session, if any.
    pub fn current_user(&self, session: &Session) -> Result<Option<User>, AccountError> {
        match session.user_id {
            Some(id) => Ok(self.db.get_user(id)?),
            None => Ok(None),
        }
    }

    fn link(&self, path: &str) -> String {
        format!("{}{}", self.public_url, path)
    }

    async fn send_mail(&self, to: &str, subject: &str, body: String) -> bool {
        let message = EmailMessage {
            from: self.mail_from.clone(),
            to: to.to_string(),
            subject: subject.to_string(),
            body,
        };
        match self.mailer.send(&message).await {
            Ok(()) => true,
            Err(e) => {
                log::warn!("[MAIL] Could not deliver '{}' to {}: {}", subject, to, e);
                false
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::mailer::MemoryMailer;

    pub fn accounts() -> (Accounts, Arc<Database>, Arc<MemoryMailer>) {
        let db = Arc::new(Database::open_in_memory().expect("Failed to open database"));
        let mailer = Arc::new(MemoryMailer::new());
        let accounts = Accounts::new(db.clone(), mailer.clone(), &Config::for_tests());
        (accounts, db, mailer)
    }

    /// Pull the `(uidb64, token)` pair out of the last link sent by email.
    pub fn link_parts(body: &str, prefix: &str) -> (String, String) {
        let start = body.find(prefix).expect("email contains link") + prefix.len();
        let rest: String = body[start..].chars().take_while(|c| !c.is_whitespace()).collect();
        let mut parts = rest.trim_end_matches('/').splitn(2, '/');
        let uid = parts.next().unwrap_or_default().to_string();
        let token = parts.next().unwrap_or_default().to_string();
        (uid, token)
    }

    pub fn registration(username: &str, email: &str) -> forms::RegistrationForm {
        forms::RegistrationForm {
            username: username.to_string(),
            email: email.to_string(),
            password1: "segura-2024".to_string(),
            password2: "segura-2024".to_string(),
        }
    }
}
