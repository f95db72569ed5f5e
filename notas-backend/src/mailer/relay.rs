//! Mail delivery through an HTTP relay.
//!
//! The relay receives `{from, to, subject, body}` as JSON and answers 2xx once
//! it has accepted the message. Anything else is a delivery failure.

use async_trait::async_trait;
use std::time::Duration;

use super::{DeliveryError, EmailMessage, Mailer};

const RELAY_TIMEOUT: Duration = Duration::from_secs(10);

pub struct RelayMailer {
    url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl RelayMailer {
    pub fn new(url: String, token: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(RELAY_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { url, token, client }
    }
}

#[async_trait]
impl Mailer for RelayMailer {
    fn name(&self) -> &'static str {
        "relay"
    }

    async fn send(&self, message: &EmailMessage) -> Result<(), DeliveryError> {
        let mut request = self.client.post(&self.url).json(message);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        log::debug!("[MAIL] Relay accepted message to {}", message.to);
        Ok(())
    }
}
