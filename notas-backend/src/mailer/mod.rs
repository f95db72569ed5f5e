//! Outgoing email.
//!
//! Workflows only see the [`Mailer`] trait. Which backend is used is decided
//! once at startup from the configuration.

mod console;
mod relay;

pub use console::ConsoleMailer;
pub use relay::RelayMailer;

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

use crate::config::Config;

/// A plain-text email ready to hand to a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("mail transport failed: {0}")]
    Transport(String),
    #[error("mail relay rejected the message ({status}): {body}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Short backend name, reported by the health endpoint.
    fn name(&self) -> &'static str;

    async fn send(&self, message: &EmailMessage) -> Result<(), DeliveryError>;
}

/// Pick the backend: the HTTP relay when `MAIL_RELAY_URL` is set, else the console.
pub fn from_config(config: &Config) -> Arc<dyn Mailer> {
    match &config.mail_relay_url {
        Some(url) => {
            log::info!("[MAIL] Delivering through relay at {}", url);
            Arc::new(RelayMailer::new(url.clone(), config.mail_relay_token.clone()))
        }
        None => {
            log::info!("[MAIL] No relay configured, emails will be written to the log");
            Arc::new(ConsoleMailer)
        }
    }
}

#[cfg(test)]
pub use memory::MemoryMailer;
