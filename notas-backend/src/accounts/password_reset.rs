//! Password reset by emailed link.
//!
//! Reset tokens use their own purpose salt and also sign `last_login`, so a
//! link dies once the password changes or the user logs in again.

use super::forms::SetPasswordForm;
use super::password::hash_password;
use super::{AccountError, Accounts};
use crate::models::User;
use crate::tokens::encode_uid;

const RESET_SUBJECT: &str = "Restablecé tu contraseña de Notas";

impl Accounts {
    /// Email a reset link to every active account bound to `email`.
    ///
    /// Always succeeds from the caller's point of view.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), AccountError> {
        let users = self.db.find_users_by_email(email)?;
        for user in users.iter().filter(|u| u.is_active) {
            let link = self.link(&format!(
                "/password-reset/confirm/{}/{}",
                encode_uid(user.id),
                self.reset_tokens.make_token(user)
            ));
            let body = format!(
                "Hola {},\n\n\
                 Recibimos un pedido para restablecer tu contraseña. Elegí una nueva en:\n\n\
                 {}\n\n\
                 Si no lo pediste vos, ignorá este mensaje.\n",
                user.username, link
            );
            if self.send_mail(&user.email, RESET_SUBJECT, body).await {
                log::info!("[ACCOUNTS] Password reset email sent to user {}", user.id);
            }
        }
        Ok(())
    }

    /// The user a reset link belongs to, if the link is still good.
    pub fn check_reset_link(&self, uidb64: &str, token: &str) -> Result<User, AccountError> {
        match self.user_from_uid(uidb64)? {
            Some(user) if self.reset_tokens.check_token(&user, token) => Ok(user),
            _ => Err(AccountError::InvalidLink),
        }
    }

    /// Set a new password through a reset link and end every open session.
    pub fn confirm_password_reset(
        &self,
        uidb64: &str,
        token: &str,
        form: &SetPasswordForm,
    ) -> Result<User, AccountError> {
        let mut user = self.check_reset_link(uidb64, token)?;
        let password = form.clean(&user.username)?;

        user.password_hash = hash_password(&password)?;
        self.db.set_password_hash(user.id, &user.password_hash)?;
        let dropped = self.db.delete_sessions_for_user(user.id)?;

        log::info!(
            "[ACCOUNTS] Password reset for user {} ({} sessions closed)",
            user.id,
            dropped
        );
        Ok(user)
    }
}
