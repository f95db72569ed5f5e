//! Login sessions.

use super::forms::LoginForm;
use super::password::verify_password;
use super::{AccountError, Accounts};
use crate::db::sqlite::now;
use crate::models::{AuthSession, Session, User};

/// A successful login: the user and the freshly created session row.
#[derive(Debug, Clone)]
pub struct LoggedIn {
    pub user: User,
    pub session: AuthSession,
}

impl Accounts {
    /// Check credentials and open a session.
    ///
    /// Unknown usernames, wrong passwords and inactive accounts all fail the
    /// same way.
    pub fn login(&self, form: &LoginForm) -> Result<LoggedIn, AccountError> {
        form.clean()?;

        let Some(mut user) = self.db.get_user_by_username(form.username.trim())? else {
            log::info!("[ACCOUNTS] Login failed: unknown username");
            return Err(AccountError::InvalidCredentials);
        };

        if !verify_password(&form.password, &user.password_hash) {
            log::info!("[ACCOUNTS] Login failed for user {}: wrong password", user.id);
            return Err(AccountError::InvalidCredentials);
        }

        if !user.is_active {
            log::info!("[ACCOUNTS] Login refused for user {}: account not activated", user.id);
            return Err(AccountError::InvalidCredentials);
        }

        let at = now();
        self.db.touch_last_login(user.id, &at)?;
        user.last_login = Some(at);

        let session = self.db.create_session(user.id, self.session_ttl)?;
        log::info!("[ACCOUNTS] User {} logged in", user.id);

        Ok(LoggedIn { user, session })
    }

    /// End the session, if there is one.
    pub fn logout(&self, session: &Session) -> Result<(), AccountError> {
        if let Some(token) = &session.token {
            if self.db.delete_session(token)? {
                log::info!("[ACCOUNTS] User {:?} logged out", session.user_id);
            }
        }
        Ok(())
    }

    /// Turn a presented session token into a [`Session`], sliding its expiry.
    /// Unknown or expired tokens give an anonymous session.
    pub fn resolve_session(&self, token: Option<&str>) -> Result<Session, AccountError> {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return Ok(Session::anonymous());
        };
        let session = self
            .db
            .validate_session(token, self.session_ttl)?
            .map(|row| Session::from(&row))
            .unwrap_or_default();
        Ok(session)
    }
}
