use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{Instrument, info, info_span};

use super::{DeliveryError, EmailMessage, Mailer};

/// Local dev mailer that logs metadata instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn deliver(&self, message: &EmailMessage) -> Result<(), DeliveryError> {
        // Bodies carry one-time codes; only metadata is logged.
        info!(
            to_email = %message.to,
            subject = %message.subject,
            "email delivery stub"
        );
        Ok(())
    }
}

#[derive(Serialize)]
struct RelayPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

/// Posts messages as JSON to an HTTP mail relay.
#[derive(Debug)]
pub struct RelayMailer {
    client: Client,
    url: String,
    from: String,
    token: Option<SecretString>,
}

impl RelayMailer {
    #[must_use]
    pub fn new(client: Client, url: String, from: String, token: Option<SecretString>) -> Self {
        Self {
            client,
            url,
            from,
            token,
        }
    }
}

#[async_trait]
impl Mailer for RelayMailer {
    async fn deliver(&self, message: &EmailMessage) -> Result<(), DeliveryError> {
        let payload = RelayPayload {
            from: &self.from,
            to: &message.to,
            subject: &message.subject,
            html: &message.html,
            text: &message.text,
        };
        let mut request = self.client.post(&self.url).json(&payload);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let span = info_span!("mail.relay", http.method = "POST", mail.to = %message.to);
        let response = request.send().instrument(span).await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(DeliveryError::Rejected(status.as_u16()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, http::HeaderMap, http::StatusCode, routing::post};
    use serde_json::Value;
    use std::sync::Arc;
    use tokio::{net::TcpListener, sync::Mutex};

    fn message() -> EmailMessage {
        EmailMessage {
            to: "farmer@example.com".to_string(),
            subject: "Your code".to_string(),
            html: "<p>123456</p>".to_string(),
            text: "123456".to_string(),
        }
    }

    async fn spawn_relay(status: StatusCode) -> (String, Arc<Mutex<Vec<(Option<String>, Value)>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&seen);
        let app = Router::new().route(
            "/send",
            post(move |headers: HeaderMap, Json(body): Json<Value>| {
                let captured = Arc::clone(&captured);
                async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|value| value.to_str().ok())
                        .map(str::to_string);
                    captured.lock().await.push((auth, body));
                    status
                }
            }),
        );
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind local relay");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        (format!("http://{addr}/send"), seen)
    }

    #[tokio::test]
    async fn log_mailer_always_succeeds() {
        assert!(LogMailer.deliver(&message()).await.is_ok());
    }

    #[tokio::test]
    async fn relay_mailer_posts_json_with_token() {
        let (url, seen) = spawn_relay(StatusCode::ACCEPTED).await;
        let mailer = RelayMailer::new(
            Client::new(),
            url,
            "no-reply@sporehub.local".to_string(),
            Some(SecretString::from("relay-token")),
        );

        assert!(mailer.deliver(&message()).await.is_ok());

        let seen = seen.lock().await;
        assert_eq!(seen.len(), 1);
        let (auth, body) = &seen[0];
        assert_eq!(auth.as_deref(), Some("Bearer relay-token"));
        assert_eq!(body["to"], "farmer@example.com");
        assert_eq!(body["from"], "no-reply@sporehub.local");
        assert_eq!(body["text"], "123456");
    }

    #[tokio::test]
    async fn relay_mailer_reports_rejection() {
        let (url, _seen) = spawn_relay(StatusCode::SERVICE_UNAVAILABLE).await;
        let mailer = RelayMailer::new(Client::new(), url, "a@b.c".to_string(), None);
        let result = mailer.deliver(&message()).await;
        assert!(matches!(result, Err(DeliveryError::Rejected(503))));
    }

    #[tokio::test]
    async fn stalled_relay_times_out_with_configured_limit() {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stalled relay");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let mailer = RelayMailer::new(
            Client::new(),
            format!("http://{addr}/send"),
            "a@b.c".to_string(),
            None,
        );
        let limit = std::time::Duration::from_millis(200);
        let result = crate::delivery::with_timeout(limit, mailer.deliver(&message())).await;
        assert!(matches!(result, Err(DeliveryError::Timeout(d)) if d == limit));
    }
}
