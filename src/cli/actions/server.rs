use crate::{
    api::{self, ServerConfig},
    cli::telemetry,
    delivery::DeliveryConfig,
    otp::OtpConfig,
    token::TokenVerifier,
};
use anyhow::Result;
use secrecy::SecretString;
use std::time::Duration;
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub jwt_secret: SecretString,
    pub jwt_ttl_seconds: u64,
    pub rate_limit: u32,
    pub otp_login_ttl_seconds: u64,
    pub otp_password_reset_ttl_seconds: u64,
    pub otp_verification_ttl_seconds: u64,
    pub otp_registration_ttl_seconds: u64,
    pub otp_max_attempts: u32,
    pub delivery_timeout_seconds: u64,
    pub mail_relay_url: Option<String>,
    pub mail_relay_token: Option<SecretString>,
    pub mail_from: String,
    pub messenger_webhook_url: Option<String>,
    pub messenger_token: Option<SecretString>,
}

impl Args {
    fn otp_config(&self) -> OtpConfig {
        OtpConfig::default()
            .with_login_ttl(Duration::from_secs(self.otp_login_ttl_seconds))
            .with_password_reset_ttl(Duration::from_secs(self.otp_password_reset_ttl_seconds))
            .with_verification_ttl(Duration::from_secs(self.otp_verification_ttl_seconds))
            .with_registration_ttl(Duration::from_secs(self.otp_registration_ttl_seconds))
            .with_max_attempts(self.otp_max_attempts)
            .with_delivery_timeout(Duration::from_secs(self.delivery_timeout_seconds))
    }

    fn delivery_config(&self) -> DeliveryConfig {
        let mut config = DeliveryConfig::default().with_mail_from(self.mail_from.clone());
        if let Some(url) = &self.mail_relay_url {
            config = config.with_mail_relay(url.clone(), self.mail_relay_token.clone());
        }
        if let Some(url) = &self.messenger_webhook_url {
            config = config.with_messenger_webhook(url.clone(), self.messenger_token.clone());
        }
        config
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    debug!("Server args: {:?}", args);

    let otp = args.otp_config();
    let delivery = args.delivery_config();
    let verifier = TokenVerifier::new(
        args.jwt_secret,
        Duration::from_secs(args.jwt_ttl_seconds),
    );

    let result = api::new(ServerConfig {
        port: args.port,
        dsn: args.dsn,
        verifier,
        rate_limit: args.rate_limit,
        otp,
        delivery,
    })
    .await;

    telemetry::shutdown_tracer();

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::otp::Purpose;

    fn args() -> Args {
        Args {
            port: 8080,
            dsn: "postgres://localhost/sporehub".to_string(),
            jwt_secret: SecretString::from("0123456789abcdef0123456789abcdef"),
            jwt_ttl_seconds: 3600,
            rate_limit: 60,
            otp_login_ttl_seconds: 120,
            otp_password_reset_ttl_seconds: 900,
            otp_verification_ttl_seconds: 1800,
            otp_registration_ttl_seconds: 2400,
            otp_max_attempts: 3,
            delivery_timeout_seconds: 4,
            mail_relay_url: Some("https://relay.sporehub.dev/".to_string()),
            mail_relay_token: None,
            mail_from: "ops@sporehub.dev".to_string(),
            messenger_webhook_url: None,
            messenger_token: None,
        }
    }

    #[test]
    fn otp_config_follows_args() {
        let config = args().otp_config();
        assert_eq!(config.ttl_for(Purpose::Login), Duration::from_secs(120));
        assert_eq!(
            config.ttl_for(Purpose::Registration),
            Duration::from_secs(2400)
        );
        assert_eq!(config.max_attempts(), 3);
        assert_eq!(config.delivery_timeout(), Duration::from_secs(4));
    }

    #[test]
    fn delivery_config_follows_args() {
        let config = args().delivery_config();
        assert_eq!(config.mail_from(), "ops@sporehub.dev");
    }

    #[test]
    fn debug_output_hides_secrets() {
        let rendered = format!("{:?}", args());
        assert!(!rendered.contains("0123456789abcdef"));
    }
}
