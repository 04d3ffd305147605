//! Outbound delivery collaborators.
//!
//! The OTP issuer and the messaging endpoints only hand rendered content to a `Mailer` or a
//! `Messenger` and observe success or failure. Transports never retry; callers bound every
//! call with [`with_timeout`].

mod email;
mod messenger;

pub use email::{LogMailer, RelayMailer};
pub use messenger::{LogMessenger, WebhookMessenger};

use async_trait::async_trait;
use reqwest::Client;
use secrecy::SecretString;
use std::{future::Future, sync::Arc, time::Duration};
use thiserror::Error;
use tracing::info;

pub const DEFAULT_MAIL_FROM: &str = "no-reply@sporehub.local";

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("rejected by upstream with status {0}")]
    Rejected(u16),
}

impl From<reqwest::Error> for DeliveryError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Email transport.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver a message or return an error describing why it was not accepted.
    async fn deliver(&self, message: &EmailMessage) -> Result<(), DeliveryError>;
}

/// Chat-platform transport.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_message(&self, recipient: &str, body: &str) -> Result<(), DeliveryError>;
}

/// Transport selection. Without a URL the log-only implementation is used.
#[derive(Clone, Debug)]
pub struct DeliveryConfig {
    mail_relay_url: Option<String>,
    mail_relay_token: Option<SecretString>,
    mail_from: String,
    messenger_webhook_url: Option<String>,
    messenger_token: Option<SecretString>,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            mail_relay_url: None,
            mail_relay_token: None,
            mail_from: DEFAULT_MAIL_FROM.to_string(),
            messenger_webhook_url: None,
            messenger_token: None,
        }
    }
}

impl DeliveryConfig {
    #[must_use]
    pub fn with_mail_relay(mut self, url: String, token: Option<SecretString>) -> Self {
        self.mail_relay_url = Some(url);
        self.mail_relay_token = token;
        self
    }

    #[must_use]
    pub fn with_mail_from(mut self, from: String) -> Self {
        self.mail_from = from;
        self
    }

    #[must_use]
    pub fn with_messenger_webhook(mut self, url: String, token: Option<SecretString>) -> Self {
        self.messenger_webhook_url = Some(url);
        self.messenger_token = token;
        self
    }

    #[must_use]
    pub fn mail_from(&self) -> &str {
        &self.mail_from
    }

    #[must_use]
    pub fn mailer(&self, client: &Client) -> Arc<dyn Mailer> {
        match &self.mail_relay_url {
            Some(url) => {
                info!(url = %url, "using HTTP mail relay");
                Arc::new(RelayMailer::new(
                    client.clone(),
                    url.clone(),
                    self.mail_from.clone(),
                    self.mail_relay_token.clone(),
                ))
            }
            None => {
                info!("no mail relay configured, emails are only logged");
                Arc::new(LogMailer)
            }
        }
    }

    #[must_use]
    pub fn messenger(&self, client: &Client) -> Arc<dyn Messenger> {
        match &self.messenger_webhook_url {
            Some(url) => {
                info!(url = %url, "using messenger webhook");
                Arc::new(WebhookMessenger::new(
                    client.clone(),
                    url.clone(),
                    self.messenger_token.clone(),
                ))
            }
            None => Arc::new(LogMessenger),
        }
    }
}

/// Bound a delivery future; an elapsed deadline becomes `DeliveryError::Timeout`.
///
/// # Errors
/// Returns the transport error or `Timeout`.
pub async fn with_timeout<F>(limit: Duration, delivery: F) -> Result<(), DeliveryError>
where
    F: Future<Output = Result<(), DeliveryError>>,
{
    match tokio::time::timeout(limit, delivery).await {
        Ok(result) => result,
        Err(_) => Err(DeliveryError::Timeout(limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn with_timeout_reports_elapsed() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        };
        let result = with_timeout(Duration::from_secs(5), slow).await;
        assert!(matches!(result, Err(DeliveryError::Timeout(d)) if d == Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn with_timeout_passes_through_results() {
        assert!(with_timeout(Duration::from_secs(1), async { Ok(()) })
            .await
            .is_ok());
        let failed = with_timeout(Duration::from_secs(1), async {
            Err(DeliveryError::Rejected(500))
        })
        .await;
        assert!(matches!(failed, Err(DeliveryError::Rejected(500))));
    }
}
