//! Registration and account activation.

use super::forms::RegistrationForm;
use super::password::hash_password;
use super::{AccountError, Accounts, PendingUser, DUPLICATE_EMAIL, USERNAME_TAKEN};
use crate::db::DbError;
use crate::error::FieldErrors;
use crate::models::User;
use crate::tokens::{decode_uid, encode_uid};

const ACTIVATION_SUBJECT: &str = "Activá tu cuenta de Notas";

/// A UNIQUE violation at insert time means a concurrent registration took the
/// name or address after the pre-checks; report it like the pre-checks do.
fn registration_conflict(e: DbError) -> AccountError {
    match e {
        DbError::Conflict(column) if column.ends_with("email") => {
            AccountError::Validation(FieldErrors::single("email", DUPLICATE_EMAIL))
        }
        DbError::Conflict(column) if column.ends_with("username") => {
            AccountError::Validation(FieldErrors::single("username", USERNAME_TAKEN))
        }
        other => AccountError::Database(other),
    }
}

impl Accounts {
    /// Create an inactive account and email its activation link.
    ///
    /// The account is kept even if the email cannot be delivered; the
    /// outcome is reported in [`PendingUser::activation_email_sent`].
    pub async fn register(&self, form: &RegistrationForm) -> Result<PendingUser, AccountError> {
        let clean = match form.clean() {
            Ok(clean) => clean,
            Err(mut errors) => {
                // Still report a bound email alongside the other problems
                if !errors.has("email") && self.db.email_exists(form.email.trim())? {
                    errors.add("email", DUPLICATE_EMAIL);
                }
                return Err(errors.into());
            }
        };

        let mut errors = FieldErrors::new();
        if self.db.username_exists(&clean.username)? {
            errors.add("username", USERNAME_TAKEN);
        }
        if self.db.email_exists(&clean.email)? {
            errors.add("email", DUPLICATE_EMAIL);
        }
        errors.into_result()?;

        let password_hash = hash_password(&clean.password)?;
        let user = self
            .db
            .create_user(&clean.username, &clean.email, &password_hash)
            .map_err(registration_conflict)?;

        log::info!("[ACCOUNTS] Registered user {} ({}), pending activation", user.id, user.username);

        let activation_email_sent = self.send_activation_email(&user).await;
        Ok(PendingUser {
            user: user.to_info(),
            activation_email_sent,
        })
    }

    /// Redeem an activation link. Succeeds at most once per account.
    pub fn activate(&self, uidb64: &str, token: &str) -> Result<User, AccountError> {
        let Some(mut user) = self.user_from_uid(uidb64)? else {
            log::info!("[ACCOUNTS] Activation link with unknown uid rejected");
            return Err(AccountError::InvalidLink);
        };

        if !self.activation_tokens.check_token(&user, token) {
            log::info!("[ACCOUNTS] Invalid activation token for user {}", user.id);
            return Err(AccountError::InvalidLink);
        }

        if !self.db.set_user_active(user.id)? {
            // Lost a race with another redemption of the same link
            return Err(AccountError::InvalidLink);
        }
        user.is_active = true;

        log::info!("[ACCOUNTS] Activated user {}", user.id);
        Ok(user)
    }

    /// Send a fresh activation link to every pending account bound to `email`.
    ///
    /// Reports nothing about whether such an account exists.
    pub async fn resend_activation(&self, email: &str) -> Result<(), AccountError> {
        let users = self.db.find_users_by_email(email)?;
        for user in users.iter().filter(|u| !u.is_active) {
            self.send_activation_email(user).await;
        }
        Ok(())
    }

    pub(super) fn user_from_uid(&self, uidb64: &str) -> Result<Option<User>, AccountError> {
        match decode_uid(uidb64) {
            Some(id) => Ok(self.db.get_user(id)?),
            None => Ok(None),
        }
    }

    pub(super) fn activation_link(&self, user: &User) -> String {
        let token = self.activation_tokens.make_token(user);
        self.link(&format!("/activar/{}/{}", encode_uid(user.id), token))
    }

    async fn send_activation_email(&self, user: &User) -> bool {
        let body = format!(
            "Hola {},\n\n\
             Gracias por registrarte. Para activar tu cuenta entrá al siguiente enlace:\n\n\
             {}\n\n\
             Si no creaste esta cuenta podés ignorar este mensaje.\n",
            user.username,
            self.activation_link(user)
        );
        let sent = self.send_mail(&user.email, ACTIVATION_SUBJECT, body).await;
        if sent {
            log::info!("[ACCOUNTS] Activation email sent to user {}", user.id);
        }
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{accounts, link_parts, registration};
    use super::*;

    const PREFIX: &str = "https://notas.test/activar/";

    #[test]
    fn test_insert_conflicts_become_field_errors() {
        let db = crate::db::Database::open_in_memory().unwrap();
        db.create_user("ana", "ana@example.com", "hash").unwrap();

        let err = registration_conflict(db.create_user("otra", "ANA@example.com", "hash").unwrap_err());
        match err {
            AccountError::Validation(errors) => {
                assert_eq!(errors.get("email"), [DUPLICATE_EMAIL]);
                assert!(!errors.has("username"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }

        let err = registration_conflict(db.create_user("ana", "nueva@example.com", "hash").unwrap_err());
        match err {
            AccountError::Validation(errors) => assert_eq!(errors.get("username"), [USERNAME_TAKEN]),
            other => panic!("expected validation error, got {:?}", other),
        }

        let err = registration_conflict(DbError::Conflict("auth_sessions.token".to_string()));
        assert!(matches!(err, AccountError::Database(DbError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_register_creates_inactive_user_and_sends_link() {
        let (accounts, db, mailer) = accounts();

        let pending = accounts.register(&registration("ana", "ana@example.com")).await.unwrap();
        assert!(pending.activation_email_sent);
        assert!(!pending.user.is_active);

        let email = mailer.last().expect("activation email");
        assert_eq!(email.to, "ana@example.com");
        assert_eq!(email.from, "notas@notas.test");
        assert!(email.body.contains(PREFIX));

        let stored = db.get_user(pending.user.id).unwrap().unwrap();
        assert!(!stored.is_active);
        assert_ne!(stored.password_hash, "segura-2024");
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected_in_any_case() {
        let (accounts, _, _) = accounts();
        accounts.register(&registration("ana", "ana@example.com")).await.unwrap();

        let err = accounts
            .register(&registration("otra", "ANA@example.com"))
            .await
            .unwrap_err();
        match err {
            AccountError::Validation(errors) => assert_eq!(errors.get("email"), [DUPLICATE_EMAIL]),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_reported_with_other_errors() {
        let (accounts, _, _) = accounts();
        accounts.register(&registration("ana", "ana@example.com")).await.unwrap();

        let mut form = registration("otra", "ana@example.com");
        form.password2 = "distinta-2024".to_string();
        let Err(AccountError::Validation(errors)) = accounts.register(&form).await else {
            panic!("expected validation error");
        };
        assert_eq!(errors.get("email"), [DUPLICATE_EMAIL]);
        assert!(errors.has("password2"));
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let (accounts, _, _) = accounts();
        accounts.register(&registration("ana", "ana@example.com")).await.unwrap();

        let Err(AccountError::Validation(errors)) =
            accounts.register(&registration("ana", "otra@example.com")).await
        else {
            panic!("expected validation error");
        };
        assert_eq!(errors.get("username"), [USERNAME_TAKEN]);
    }

    #[tokio::test]
    async fn test_activation_link_works_exactly_once() {
        let (accounts, db, mailer) = accounts();
        let pending = accounts.register(&registration("ana", "ana@example.com")).await.unwrap();
        let (uid, token) = link_parts(&mailer.last().unwrap().body, PREFIX);

        let user = accounts.activate(&uid, &token).unwrap();
        assert!(user.is_active);
        assert!(db.get_user(pending.user.id).unwrap().unwrap().is_active);

        assert!(matches!(accounts.activate(&uid, &token), Err(AccountError::InvalidLink)));
    }

    #[tokio::test]
    async fn test_token_does_not_activate_other_user() {
        let (accounts, db, mailer) = accounts();
        accounts.register(&registration("ana", "ana@example.com")).await.unwrap();
        let (_, ana_token) = link_parts(&mailer.last().unwrap().body, PREFIX);
        let beto = accounts.register(&registration("beto", "beto@example.com")).await.unwrap();

        let err = accounts.activate(&encode_uid(beto.user.id), &ana_token).unwrap_err();
        assert!(matches!(err, AccountError::InvalidLink));
        assert!(!db.get_user(beto.user.id).unwrap().unwrap().is_active);
    }

    #[tokio::test]
    async fn test_garbage_links_rejected() {
        let (accounts, _, _) = accounts();
        accounts.register(&registration("ana", "ana@example.com")).await.unwrap();

        assert!(matches!(accounts.activate("%%%", "x-y"), Err(AccountError::InvalidLink)));
        assert!(matches!(accounts.activate(&encode_uid(999), "x-y"), Err(AccountError::InvalidLink)));
        assert!(matches!(accounts.activate(&encode_uid(1), "bogus"), Err(AccountError::InvalidLink)));
    }

    #[tokio::test]
    async fn test_delivery_failure_keeps_account() {
        let (accounts, db, mailer) = accounts();
        mailer.set_failing(true);

        let pending = accounts.register(&registration("ana", "ana@example.com")).await.unwrap();
        assert!(!pending.activation_email_sent);
        assert!(db.get_user(pending.user.id).unwrap().is_some());

        mailer.set_failing(false);
        accounts.resend_activation("ANA@example.com").await.unwrap();
        let (uid, token) = link_parts(&mailer.last().unwrap().body, PREFIX);
        assert!(accounts.activate(&uid, &token).is_ok());
    }

    #[tokio::test]
    async fn test_resend_skips_active_and_unknown() {
        let (accounts, _, mailer) = accounts();
        accounts.register(&registration("ana", "ana@example.com")).await.unwrap();
        let (uid, token) = link_parts(&mailer.last().unwrap().body, PREFIX);
        accounts.activate(&uid, &token).unwrap();

        accounts.resend_activation("ana@example.com").await.unwrap();
        accounts.resend_activation("nadie@example.com").await.unwrap();
        assert_eq!(mailer.sent().len(), 1);
    }
}
