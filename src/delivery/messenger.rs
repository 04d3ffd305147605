use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::{Instrument, info, info_span};

use super::{DeliveryError, Messenger};

#[derive(Clone, Debug)]
pub struct LogMessenger;

#[async_trait]
impl Messenger for LogMessenger {
    async fn send_message(&self, recipient: &str, body: &str) -> Result<(), DeliveryError> {
        info!(recipient, length = body.len(), "chat delivery stub");
        Ok(())
    }
}

/// Forwards chat messages to a webhook bridge as `{"to", "message"}`.
#[derive(Debug)]
pub struct WebhookMessenger {
    client: Client,
    url: String,
    token: Option<SecretString>,
}

impl WebhookMessenger {
    #[must_use]
    pub fn new(client: Client, url: String, token: Option<SecretString>) -> Self {
        Self { client, url, token }
    }
}

#[async_trait]
impl Messenger for WebhookMessenger {
    async fn send_message(&self, recipient: &str, body: &str) -> Result<(), DeliveryError> {
        let mut request = self
            .client
            .post(&self.url)
            .json(&json!({ "to": recipient, "message": body }));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let span = info_span!("messenger.webhook", http.method = "POST");
        let response = request.send().instrument(span).await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(DeliveryError::Rejected(response.status().as_u16()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, http::StatusCode, routing::post};
    use serde_json::Value;
    use std::sync::Arc;
    use tokio::{net::TcpListener, sync::Mutex};

    #[tokio::test]
    async fn webhook_messenger_forwards_recipient_and_body() {
        let seen: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
        let captured = Arc::clone(&seen);
        let app = Router::new().route(
            "/hook",
            post(move |Json(body): Json<Value>| {
                let captured = Arc::clone(&captured);
                async move {
                    *captured.lock().await = Some(body);
                    StatusCode::OK
                }
            }),
        );
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind local webhook");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let messenger = WebhookMessenger::new(Client::new(), format!("http://{addr}/hook"), None);
        assert!(
            messenger
                .send_message("+254700000000", "Humidity alert")
                .await
                .is_ok()
        );

        let body = seen.lock().await.clone().unwrap_or(Value::Null);
        assert_eq!(body["to"], "+254700000000");
        assert_eq!(body["message"], "Humidity alert");
    }

    #[tokio::test]
    async fn webhook_messenger_surfaces_transport_errors() {
        // Nothing listens on port 9 locally.
        let messenger =
            WebhookMessenger::new(Client::new(), "http://127.0.0.1:9/hook".to_string(), None);
        let result = messenger.send_message("+1", "hi").await;
        assert!(matches!(result, Err(DeliveryError::Transport(_))));
    }

    #[tokio::test]
    async fn log_messenger_succeeds() {
        assert!(LogMessenger.send_message("+1", "hi").await.is_ok());
    }
}
