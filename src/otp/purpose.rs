use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use utoipa::ToSchema;

/// Why a one-time code was issued.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Purpose {
    Login,
    PasswordReset,
    Verification,
    Registration,
}

impl Purpose {
    pub const ALL: [Self; 4] = [
        Self::Login,
        Self::PasswordReset,
        Self::Verification,
        Self::Registration,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::PasswordReset => "password-reset",
            Self::Verification => "verification",
            Self::Registration => "registration",
        }
    }

    /// Human-readable label substituted into templates.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::PasswordReset => "password reset",
            Self::Verification => "email verification",
            Self::Registration => "registration",
        }
    }

    /// Login and password-reset codes are only issued for known identities.
    #[must_use]
    pub const fn requires_known_identity(self) -> bool {
        matches!(self, Self::Login | Self::PasswordReset)
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Purpose {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|purpose| purpose.as_str() == normalized)
            .ok_or_else(|| format!("Unknown purpose: {}", value.trim()))
    }
}
