//! One-time codes scoped to an email and a purpose.
//!
//! Flow Overview:
//! 1) `issue` stores a fresh code for `(email, purpose)`, superseding any earlier one.
//! 2) The rendered message goes to the mailer under a deadline. A failed delivery keeps the
//!    record so the code can be resent.
//! 3) `verify` consumes the record on a match and reports `Expired` for any code presented
//!    after the deadline.
//!
//! State is in-memory and local to the process.

mod issuer;
mod purpose;
mod store;
mod template;

pub use issuer::{Issued, OtpIssuer};
pub use purpose::Purpose;
pub use store::{OtpRecord, OtpStore};
pub use template::{CODE_PLACEHOLDER, PURPOSE_PLACEHOLDER, Template, TemplateError};

use regex::Regex;
use std::time::Duration;
use thiserror::Error;

use crate::delivery::DeliveryError;

const DEFAULT_LOGIN_TTL_SECONDS: u64 = 5 * 60;
const DEFAULT_PASSWORD_RESET_TTL_SECONDS: u64 = 15 * 60;
const DEFAULT_VERIFICATION_TTL_SECONDS: u64 = 30 * 60;
const DEFAULT_REGISTRATION_TTL_SECONDS: u64 = 30 * 60;
const DEFAULT_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_DELIVERY_TIMEOUT_SECONDS: u64 = 10;

#[derive(Debug, Error)]
pub enum OtpError {
    #[error("A valid email address is required")]
    InvalidEmail,
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error("No active code for this email and purpose")]
    NoActiveRecord,
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

/// Outcome of presenting a code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verification {
    Valid,
    Expired,
    Invalid,
    NotFound,
}

impl Verification {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Valid => "valid",
            Self::Expired => "expired",
            Self::Invalid => "invalid",
            Self::NotFound => "not_found",
        }
    }
}

#[derive(Clone, Debug)]
pub struct OtpConfig {
    login_ttl: Duration,
    password_reset_ttl: Duration,
    verification_ttl: Duration,
    registration_ttl: Duration,
    max_attempts: u32,
    delivery_timeout: Duration,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            login_ttl: Duration::from_secs(DEFAULT_LOGIN_TTL_SECONDS),
            password_reset_ttl: Duration::from_secs(DEFAULT_PASSWORD_RESET_TTL_SECONDS),
            verification_ttl: Duration::from_secs(DEFAULT_VERIFICATION_TTL_SECONDS),
            registration_ttl: Duration::from_secs(DEFAULT_REGISTRATION_TTL_SECONDS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delivery_timeout: Duration::from_secs(DEFAULT_DELIVERY_TIMEOUT_SECONDS),
        }
    }
}

impl OtpConfig {
    #[must_use]
    pub fn with_login_ttl(mut self, ttl: Duration) -> Self {
        self.login_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_password_reset_ttl(mut self, ttl: Duration) -> Self {
        self.password_reset_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_verification_ttl(mut self, ttl: Duration) -> Self {
        self.verification_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_registration_ttl(mut self, ttl: Duration) -> Self {
        self.registration_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_delivery_timeout(mut self, timeout: Duration) -> Self {
        self.delivery_timeout = timeout;
        self
    }

    /// How long a code issued for `purpose` stays valid.
    #[must_use]
    pub const fn ttl_for(&self, purpose: Purpose) -> Duration {
        match purpose {
            Purpose::Login => self.login_ttl,
            Purpose::PasswordReset => self.password_reset_ttl,
            Purpose::Verification => self.verification_ttl,
            Purpose::Registration => self.registration_ttl,
        }
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn delivery_timeout(&self) -> Duration {
        self.delivery_timeout
    }
}

/// Normalize an email for record keys.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
#[must_use]
pub fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

pub(crate) fn checked_email(email: &str) -> Result<String, OtpError> {
    let normalized = normalize_email(email);
    if valid_email(&normalized) {
        Ok(normalized)
    } else {
        Err(OtpError::InvalidEmail)
    }
}
