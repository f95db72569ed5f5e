//! Argon2id password hashing and the password rules applied to new passwords.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use super::AccountError;
use crate::error::FieldErrors;

pub const MIN_PASSWORD_CHARS: usize = 8;

pub const PASSWORD_MISMATCH: &str = "Las dos contraseñas no coinciden.";
pub const PASSWORD_TOO_SHORT: &str = "La contraseña es demasiado corta. Debe contener al menos 8 caracteres.";
pub const PASSWORD_NUMERIC: &str = "La contraseña no puede ser completamente numérica.";
pub const PASSWORD_LIKE_USERNAME: &str = "La contraseña es demasiado similar al nombre de usuario.";

/// Hash a password using Argon2id. Returns a PHC-format string.
pub fn hash_password(password: &str) -> Result<String, AccountError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AccountError::PasswordHash(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

/// Check a password against a stored PHC string. A malformed hash never matches.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            log::error!("[ACCOUNTS] Stored password hash is malformed: {}", e);
            false
        }
    }
}

/// Apply the confirmation and strength rules, recording failures under `field`.
pub fn validate_new_password(
    password: &str,
    confirmation: &str,
    username: &str,
    field: &str,
    errors: &mut FieldErrors,
) {
    if password.is_empty() {
        errors.add(field, crate::error::REQUIRED);
        return;
    }
    if password != confirmation {
        errors.add(field, PASSWORD_MISMATCH);
        return;
    }
    if password.chars().count() < MIN_PASSWORD_CHARS {
        errors.add(field, PASSWORD_TOO_SHORT);
    }
    if password.chars().all(|c| c.is_ascii_digit()) {
        errors.add(field, PASSWORD_NUMERIC);
    }
    if !username.is_empty() && password.to_lowercase() == username.to_lowercase() {
        errors.add(field, PASSWORD_LIKE_USERNAME);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_password("same-password").unwrap();
        let b = hash_password("same-password").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_hash_never_matches() {
        assert!(!verify_password("anything", "not-a-phc-string"));
    }

    #[test]
    fn test_password_rules() {
        let check = |p: &str, c: &str| {
            let mut errors = FieldErrors::new();
            validate_new_password(p, c, "ana", "password2", &mut errors);
            errors.get("password2").to_vec()
        };

        assert!(check("segura-2024", "segura-2024").is_empty());
        assert_eq!(check("", ""), [crate::error::REQUIRED]);
        assert_eq!(check("segura-2024", "otra-cosa"), [PASSWORD_MISMATCH]);
        assert_eq!(check("corta", "corta"), [PASSWORD_TOO_SHORT]);
        assert_eq!(check("1234567890", "1234567890"), [PASSWORD_NUMERIC]);

        let mut errors = FieldErrors::new();
        validate_new_password("anaperez", "anaperez", "AnaPerez", "password2", &mut errors);
        assert_eq!(errors.get("password2"), [PASSWORD_LIKE_USERNAME]);
    }
}
