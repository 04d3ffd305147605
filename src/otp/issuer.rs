use rand::{Rng, rngs::OsRng};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{info, warn};

use super::{
    OtpConfig, OtpError, OtpRecord, OtpStore, Purpose, Template, Verification, checked_email,
};
use crate::delivery::{self, DeliveryError, Mailer};

const CODE_SPACE: u32 = 1_000_000;

/// Result of an issuance. The record is stored even when `delivery` failed.
#[derive(Debug)]
pub struct Issued {
    pub record: OtpRecord,
    pub delivery: Result<(), DeliveryError>,
}

impl Issued {
    #[must_use]
    pub fn code(&self) -> &str {
        self.record.code()
    }

    #[must_use]
    pub fn delivered(&self) -> bool {
        self.delivery.is_ok()
    }
}

pub struct OtpIssuer {
    config: OtpConfig,
    store: OtpStore,
    mailer: Arc<dyn Mailer>,
}

impl OtpIssuer {
    #[must_use]
    pub fn new(config: OtpConfig, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            store: OtpStore::new(config.max_attempts()),
            config,
            mailer,
        }
    }

    #[must_use]
    pub fn config(&self) -> &OtpConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &OtpStore {
        &self.store
    }

    /// Issue a code rendered with the default template for `purpose`.
    ///
    /// # Errors
    /// Returns `OtpError::InvalidEmail` for a malformed address. Delivery failures are
    /// reported through [`Issued::delivery`].
    pub async fn issue(&self, email: &str, purpose: Purpose) -> Result<Issued, OtpError> {
        self.issue_with(email, purpose, &Template::default_for(purpose))
            .await
    }

    /// Issue a code rendered from caller-supplied templates.
    ///
    /// # Errors
    /// Returns `OtpError::Template` when a body does not carry each placeholder exactly once,
    /// or `OtpError::InvalidEmail`.
    pub async fn issue_with_template(
        &self,
        email: &str,
        purpose: Purpose,
        subject: &str,
        html: &str,
        text: &str,
    ) -> Result<Issued, OtpError> {
        let template = Template::new(subject, html, text)?;
        self.issue_with(email, purpose, &template).await
    }

    async fn issue_with(
        &self,
        email: &str,
        purpose: Purpose,
        template: &Template,
    ) -> Result<Issued, OtpError> {
        let email = checked_email(email)?;
        let code = generate_code();
        let expires_at = Instant::now() + self.config.ttl_for(purpose);
        let record = self.store.insert(&email, purpose, &code, expires_at).await;
        info!(email = %email, purpose = %purpose, "otp issued");

        let delivery = self.deliver(&record, template).await;
        Ok(Issued { record, delivery })
    }

    /// Deliver the active code again without generating a new one. The expiry is unchanged.
    ///
    /// # Errors
    /// Returns `OtpError::NoActiveRecord` when nothing active matches `code`, or
    /// `OtpError::Delivery` when the mailer fails.
    pub async fn resend(
        &self,
        email: &str,
        purpose: Purpose,
        code: &str,
    ) -> Result<OtpRecord, OtpError> {
        let email = checked_email(email)?;
        let record = self
            .store
            .active(&email, purpose, code.trim())
            .await
            .ok_or(OtpError::NoActiveRecord)?;
        self.deliver(&record, &Template::default_for(purpose))
            .await?;
        info!(email = %email, purpose = %purpose, "otp resent");
        Ok(record)
    }

    /// Check a presented code against the active record.
    ///
    /// # Errors
    /// Returns `OtpError::InvalidEmail` for a malformed address.
    pub async fn verify(
        &self,
        email: &str,
        purpose: Purpose,
        code: &str,
    ) -> Result<Verification, OtpError> {
        let email = checked_email(email)?;
        let outcome = self.store.verify(&email, purpose, code.trim()).await;
        match outcome {
            Verification::Valid => info!(email = %email, purpose = %purpose, "otp verified"),
            other => warn!(
                email = %email,
                purpose = %purpose,
                outcome = other.as_str(),
                "otp verification failed"
            ),
        }
        Ok(outcome)
    }

    async fn deliver(&self, record: &OtpRecord, template: &Template) -> Result<(), DeliveryError> {
        let message = template.render(&record.email, record.code(), record.purpose);
        let result =
            delivery::with_timeout(self.config.delivery_timeout(), self.mailer.deliver(&message))
                .await;
        if let Err(err) = &result {
            warn!(
                email = %record.email,
                purpose = %record.purpose,
                "otp delivery failed: {err}"
            );
        }
        result
    }
}

fn generate_code() -> String {
    format!("{:06}", OsRng.gen_range(0..CODE_SPACE))
}
