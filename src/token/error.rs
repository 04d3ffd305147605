use thiserror::Error;

/// Detailed verification failure. Only logged; callers see [`InvalidToken`].
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("invalid signing key")]
    InvalidKey,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("invalid issued-at")]
    InvalidIat,
    #[error("missing subject")]
    MissingSubject,
    #[error("missing email")]
    MissingEmail,
}

/// The single outward-facing verification failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid or expired token")]
pub struct InvalidToken;
