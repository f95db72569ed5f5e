use async_trait::async_trait;

use super::{DeliveryError, EmailMessage, Mailer};

/// Writes each message to the log. Development default.
pub struct ConsoleMailer;

#[async_trait]
impl Mailer for ConsoleMailer {
    fn name(&self) -> &'static str {
        "console"
    }

    async fn send(&self, message: &EmailMessage) -> Result<(), DeliveryError> {
        log::info!(
            "[MAIL] From: {}\nTo: {}\nSubject: {}\n\n{}",
            message.from,
            message.to,
            message.subject,
            message.body
        );
        Ok(())
    }
}
