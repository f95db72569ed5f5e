use rand::RngCore;
use std::env;
use std::str::FromStr;

/// Environment variable names - single source of truth
pub mod env_vars {
    pub const PORT: &str = "PORT";
    pub const DATABASE_URL: &str = "DATABASE_URL";
    /// Externally reachable base URL, used to build activation and reset links.
    pub const PUBLIC_URL: &str = "NOTAS_PUBLIC_URL";
    /// Server-wide secret mixed into every signed token.
    pub const SECRET_KEY: &str = "NOTAS_SECRET_KEY";
    pub const MAIL_FROM: &str = "NOTAS_MAIL_FROM";
    /// When set, outgoing mail is POSTed to this relay instead of being logged.
    pub const MAIL_RELAY_URL: &str = "MAIL_RELAY_URL";
    pub const MAIL_RELAY_TOKEN: &str = "MAIL_RELAY_TOKEN";
    pub const TOKEN_BUCKET_SECS: &str = "TOKEN_BUCKET_SECS";
    pub const TOKEN_VALID_BUCKETS: &str = "TOKEN_VALID_BUCKETS";
    pub const SESSION_TTL_HOURS: &str = "SESSION_TTL_HOURS";
    /// Set to "true" or "1" to mark cookies `Secure` (HTTPS deployments).
    pub const SECURE_COOKIES: &str = "SECURE_COOKIES";
}

/// Default values
pub mod defaults {
    pub const PORT: u16 = 8080;
    pub const DATABASE_URL: &str = "./.db/notas.db";
    pub const MAIL_FROM: &str = "no-responder@localhost";
    /// One hour per timestamp bucket.
    pub const TOKEN_BUCKET_SECS: i64 = 3600;
    /// 72 buckets of one hour: links stay valid for three days.
    pub const TOKEN_VALID_BUCKETS: i64 = 72;
    pub const SESSION_TTL_HOURS: i64 = 24;

    /// Upper bounds for the numeric settings above.
    pub const MAX_TOKEN_BUCKET_SECS: i64 = 7 * 24 * 3600;
    pub const MAX_TOKEN_VALID_BUCKETS: i64 = 10_000;
    pub const MAX_SESSION_TTL_HOURS: i64 = 10 * 365 * 24;
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub public_url: String,
    pub secret_key: String,
    pub mail_from: String,
    pub mail_relay_url: Option<String>,
    pub mail_relay_token: Option<String>,
    pub token_bucket_secs: i64,
    pub token_valid_buckets: i64,
    pub session_ttl_hours: i64,
    pub secure_cookies: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = parse_var(&get, env_vars::PORT, defaults::PORT)?;

        let public_url = match get(env_vars::PUBLIC_URL) {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://localhost:{}", port),
        };

        let secret_key = match get(env_vars::SECRET_KEY) {
            Some(key) => key,
            None if cfg!(debug_assertions) => {
                log::warn!(
                    "{} not set; using a random per-process key (links die on restart)",
                    env_vars::SECRET_KEY
                );
                random_secret()
            }
            None => return Err(ConfigError::Missing(env_vars::SECRET_KEY)),
        };

        let token_bucket_secs = parse_bounded(
            &get,
            env_vars::TOKEN_BUCKET_SECS,
            defaults::TOKEN_BUCKET_SECS,
            defaults::MAX_TOKEN_BUCKET_SECS,
        )?;
        let token_valid_buckets = parse_bounded(
            &get,
            env_vars::TOKEN_VALID_BUCKETS,
            defaults::TOKEN_VALID_BUCKETS,
            defaults::MAX_TOKEN_VALID_BUCKETS,
        )?;
        let session_ttl_hours = parse_bounded(
            &get,
            env_vars::SESSION_TTL_HOURS,
            defaults::SESSION_TTL_HOURS,
            defaults::MAX_SESSION_TTL_HOURS,
        )?;

        Ok(Self {
            port,
            database_url: get(env_vars::DATABASE_URL).unwrap_or_else(|| defaults::DATABASE_URL.to_string()),
            public_url,
            secret_key,
            mail_from: get(env_vars::MAIL_FROM).unwrap_or_else(|| defaults::MAIL_FROM.to_string()),
            mail_relay_url: get(env_vars::MAIL_RELAY_URL),
            mail_relay_token: get(env_vars::MAIL_RELAY_TOKEN),
            token_bucket_secs,
            token_valid_buckets,
            session_ttl_hours,
            secure_cookies: get(env_vars::SECURE_COOKIES)
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        })
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_ttl_hours)
    }
}

fn parse_var<T, G>(get: &G, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid { name, value: raw }),
        None => Ok(default),
    }
}

/// Like [`parse_var`], but the value must lie in `1..=max`.
fn parse_bounded<G>(get: &G, name: &'static str, default: i64, max: i64) -> Result<i64, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let value = parse_var(get, name, default)?;
    if (1..=max).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
        })
    }
}

fn random_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
impl Config {
    /// Fixed configuration for tests: in-memory friendly, deterministic secret.
    pub fn for_tests() -> Self {
        Self::from_lookup(|name| match name {
            env_vars::SECRET_KEY => Some("test-secret-key".to_string()),
            env_vars::PUBLIC_URL => Some("https://notas.test/".to_string()),
            env_vars::MAIL_FROM => Some("notas@notas.test".to_string()),
            _ => None,
        })
        .expect("test config is valid")
    }
}
