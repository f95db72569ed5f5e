//! Stateless, signed one-time links.
//!
//! A token is `<bucket>-<tag>`: `bucket` is the issue time divided into
//! fixed-width buckets (base36), `tag` is a truncated HMAC-SHA256 over the
//! user's current state plus that bucket. Nothing is stored server side.
//! Because the state includes `is_active` (and, for resets, the password hash
//! and last login), a token stops validating as soon as it has been used.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::config::Config;
use crate::models::User;

type HmacSha256 = Hmac<Sha256>;

/// Bytes of the HMAC output kept in the token.
const TAG_LEN: usize = 16;
/// `i64::MAX` in base36 is 13 digits.
const MAX_BUCKET_DIGITS: usize = 13;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPurpose {
    Activation,
    PasswordReset,
}

impl TokenPurpose {
    /// Domain separation salt; a token minted for one purpose never verifies for another.
    fn salt(self) -> &'static str {
        match self {
            TokenPurpose::Activation => "notas.accounts.activation",
            TokenPurpose::PasswordReset => "notas.accounts.password_reset",
        }
    }
}

pub struct TokenGenerator {
    purpose: TokenPurpose,
    mac: HmacSha256,
    bucket_secs: i64,
    valid_buckets: i64,
}

impl TokenGenerator {
    pub fn new(purpose: TokenPurpose, secret: &str, bucket_secs: i64, valid_buckets: i64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(purpose.salt().as_bytes());
        hasher.update(secret.as_bytes());
        let key = hasher.finalize();

        let mac = HmacSha256::new_from_slice(&key).expect("HMAC accepts keys of any length");

        Self {
            purpose,
            mac,
            bucket_secs: bucket_secs.max(1),
            valid_buckets: valid_buckets.max(0),
        }
    }

    pub fn activation(config: &Config) -> Self {
        Self::new(
            TokenPurpose::Activation,
            &config.secret_key,
            config.token_bucket_secs,
            config.token_valid_buckets,
        )
    }

    pub fn password_reset(config: &Config) -> Self {
        Self::new(
            TokenPurpose::PasswordReset,
            &config.secret_key,
            config.token_bucket_secs,
            config.token_valid_buckets,
        )
    }

    pub fn make_token(&self, user: &User) -> String {
        self.make_token_at(user, Utc::now())
    }

    pub fn make_token_at(&self, user: &User, at: DateTime<Utc>) -> String {
        let bucket = self.bucket_of(at);
        let tag = self.tag(user, bucket);
        format!("{}-{}", to_base36(bucket), hex::encode(&tag[..TAG_LEN]))
    }

    pub fn check_token(&self, user: &User, token: &str) -> bool {
        self.check_token_at(user, token, Utc::now())
    }

    /// True when `token` was issued for this user's current state, not in the
    /// future, and no more than `valid_buckets` buckets ago.
    pub fn check_token_at(&self, user: &User, token: &str, at: DateTime<Utc>) -> bool {
        let Some((bucket_part, tag_part)) = token.split_once('-') else {
            return false;
        };
        let Some(bucket) = from_base36(bucket_part) else {
            return false;
        };

        let current = self.bucket_of(at);
        if bucket > current || current - bucket > self.valid_buckets {
            return false;
        }

        let Ok(tag) = hex::decode(tag_part) else {
            return false;
        };
        if tag.len() != TAG_LEN {
            return false;
        }

        self.mac_for(user, bucket).verify_truncated_left(&tag).is_ok()
    }

    fn bucket_of(&self, at: DateTime<Utc>) -> i64 {
        at.timestamp().div_euclid(self.bucket_secs)
    }

    fn mac_for(&self, user: &User, bucket: i64) -> HmacSha256 {
        let mut mac = self.mac.clone();
        mac.update(self.state_message(user, bucket).as_bytes());
        mac
    }

    fn tag(&self, user: &User, bucket: i64) -> Vec<u8> {
        self.mac_for(user, bucket).finalize().into_bytes().to_vec()
    }

    fn state_message(&self, user: &User, bucket: i64) -> String {
        let last_login = match self.purpose {
            TokenPurpose::PasswordReset => user
                .last_login
                .map(|ts| ts.timestamp_micros().to_string())
                .unwrap_or_default(),
            TokenPurpose::Activation => String::new(),
        };
        format!(
            "{}|{}|{}|{}|{}|{}",
            user.id, user.password_hash, user.is_active, last_login, user.email, bucket
        )
    }
}

/// Opaque URL segment carrying a user id.
pub fn encode_uid(id: i64) -> String {
    URL_SAFE_NO_PAD.encode(id.to_string())
}

pub fn decode_uid(uidb64: &str) -> Option<i64> {
    let bytes = URL_SAFE_NO_PAD.decode(uidb64).ok()?;
    let text = String::from_utf8(bytes).ok()?;
    text.parse().ok()
}

fn to_base36(mut n: i64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n <= 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

fn from_base36(s: &str) -> Option<i64> {
    if s.is_empty() || s.len() > MAX_BUCKET_DIGITS || !s.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return None;
    }
    i64::from_str_radix(&s.to_ascii_lowercase(), 36).ok()
}
