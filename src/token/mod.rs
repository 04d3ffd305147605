//! Bearer credentials: HS256 JWTs carrying the caller's identity claims.
//!
//! Verification is a pure function of the token, the server secret and the current unix
//! time. Every failure collapses to [`InvalidToken`]; the precise reason is logged at debug
//! level only.

mod error;

pub use error::{Error, InvalidToken};

use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::{fmt, str::FromStr, time::Duration};
use tracing::debug;
use utoipa::ToSchema;

type HmacSha256 = Hmac<Sha256>;

const ALG: &str = "HS256";

/// Closed set of account roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Farmer,
    Buyer,
    Admin,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Farmer => "farmer",
            Self::Buyer => "buyer",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "farmer" => Ok(Self::Farmer),
            "buyer" => Ok(Self::Buyer),
            "admin" => Ok(Self::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenHeader {
    pub alg: String,
    pub typ: String,
}

impl TokenHeader {
    fn hs256() -> Self {
        Self {
            alg: ALG.to_string(),
            typ: "JWT".to_string(),
        }
    }
}

/// Decoded identity payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, Error> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, Error> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| Error::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn mac(secret: &[u8]) -> Result<HmacSha256, Error> {
    HmacSha256::new_from_slice(secret).map_err(|_| Error::InvalidKey)
}

/// Create an HS256 signed token.
///
/// # Errors
///
/// Returns an error if the header or claims cannot be encoded or the key is unusable.
pub fn sign_hs256(secret: &[u8], claims: &Claims) -> Result<String, Error> {
    let header_b64 = b64e_json(&TokenHeader::hs256())?;
    let claims_b64 = b64e_json(claims)?;
    let signing_input = format!("{header_b64}.{claims_b64}");

    let mut mac = mac(secret)?;
    mac.update(signing_input.as_bytes());
    let signature_b64 = Base64UrlUnpadded::encode_string(&mac.finalize().into_bytes());

    Ok(format!("{signing_input}.{signature_b64}"))
}

/// Verify an HS256 token and return its decoded claims.
///
/// # Errors
///
/// Returns an error if:
/// - the token is malformed or contains invalid base64/json,
/// - the header does not announce `HS256`,
/// - the signature does not match,
/// - the claims fail validation (`exp`, `iat`, `sub`, `email`).
pub fn verify_hs256(token: &str, secret: &[u8], now_unix_seconds: i64) -> Result<Claims, Error> {
    let mut parts = token.split('.');
    let header_b64 = parts.next().ok_or(Error::TokenFormat)?;
    let claims_b64 = parts.next().ok_or(Error::TokenFormat)?;
    let sig_b64 = parts.next().ok_or(Error::TokenFormat)?;
    if parts.next().is_some() {
        return Err(Error::TokenFormat);
    }

    let header: TokenHeader = b64d_json(header_b64)?;
    if header.alg != ALG {
        return Err(Error::UnsupportedAlg(header.alg));
    }

    let signature = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| Error::Base64)?;
    let mut mac = mac(secret)?;
    mac.update(header_b64.as_bytes());
    mac.update(b".");
    mac.update(claims_b64.as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| Error::InvalidSignature)?;

    let claims: Claims = b64d_json(claims_b64)?;
    if claims.sub.trim().is_empty() {
        return Err(Error::MissingSubject);
    }
    if claims.email.trim().is_empty() {
        return Err(Error::MissingEmail);
    }
    if claims.iat > claims.exp {
        return Err(Error::InvalidIat);
    }
    if claims.exp <= now_unix_seconds {
        return Err(Error::Expired);
    }

    Ok(claims)
}

/// A freshly signed bearer credential.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_in: Duration,
}

/// Holds the server secret; signs and verifies bearer credentials.
pub struct TokenVerifier {
    secret: SecretString,
    ttl: Duration,
}

impl fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenVerifier {
    #[must_use]
    pub fn new(secret: SecretString, ttl: Duration) -> Self {
        Self { secret, ttl }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign a token for the given identity fields.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails.
    pub fn issue(
        &self,
        subject: &str,
        email: &str,
        role: Role,
        now_unix_seconds: i64,
    ) -> Result<IssuedToken, Error> {
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = Claims {
            sub: subject.to_string(),
            email: email.to_string(),
            role,
            iat: now_unix_seconds,
            exp: now_unix_seconds.saturating_add(ttl),
        };
        let token = sign_hs256(self.secret.expose_secret().as_bytes(), &claims)?;
        Ok(IssuedToken {
            token,
            expires_in: self.ttl,
        })
    }

    /// Verify a presented credential.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidToken`] for any malformed, forged, expired or incomplete token.
    pub fn verify(&self, token: &str, now_unix_seconds: i64) -> Result<Claims, InvalidToken> {
        verify_hs256(token, self.secret.expose_secret().as_bytes(), now_unix_seconds).map_err(
            |err| {
                debug!(reason = %err, "bearer token rejected");
                InvalidToken
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";
    const NOW: i64 = 1_700_000_000;

    fn claims() -> Claims {
        Claims {
            sub: "4b8f0b52-0d3e-4c1e-9a5e-0d6d2f3f8a11".to_string(),
            email: "farmer@example.com".to_string(),
            role: Role::Farmer,
            iat: NOW,
            exp: NOW + 3600,
        }
    }

    fn verifier() -> TokenVerifier {
        TokenVerifier::new(
            SecretString::from("0123456789abcdef0123456789abcdef"),
            Duration::from_secs(3600),
        )
    }

    fn resign_with(header: &str, payload: &serde_json::Value) -> String {
        let header_b64 = Base64UrlUnpadded::encode_string(header.as_bytes());
        let claims_b64 = Base64UrlUnpadded::encode_string(payload.to_string().as_bytes());
        let input = format!("{header_b64}.{claims_b64}");
        let mut mac = HmacSha256::new_from_slice(SECRET).expect("hmac accepts any key length");
        mac.update(input.as_bytes());
        let sig = Base64UrlUnpadded::encode_string(&mac.finalize().into_bytes());
        format!("{input}.{sig}")
    }

    #[test]
    fn sign_and_verify() -> Result<(), Error> {
        let token = sign_hs256(SECRET, &claims())?;
        let verified = verify_hs256(&token, SECRET, NOW + 10)?;
        assert_eq!(verified, claims());
        Ok(())
    }

    #[test]
    fn rejects_wrong_secret() -> Result<(), Error> {
        let token = sign_hs256(SECRET, &claims())?;
        let result = verify_hs256(&token, b"another-secret", NOW);
        assert!(matches!(result, Err(Error::InvalidSignature)));
        Ok(())
    }

    #[test]
    fn rejects_tampered_claims() -> Result<(), Error> {
        let token = sign_hs256(SECRET, &claims())?;
        let mut forged = claims();
        forged.role = Role::Admin;
        let forged_b64 = b64e_json(&forged)?;
        let mut parts: Vec<&str> = token.split('.').collect();
        parts[1] = &forged_b64;
        let result = verify_hs256(&parts.join("."), SECRET, NOW);
        assert!(matches!(result, Err(Error::InvalidSignature)));
        Ok(())
    }

    #[test]
    fn rejects_expired() -> Result<(), Error> {
        let token = sign_hs256(SECRET, &claims())?;
        assert!(matches!(
            verify_hs256(&token, SECRET, NOW + 3600),
            Err(Error::Expired)
        ));
        Ok(())
    }

    #[test]
    fn rejects_malformed() {
        assert!(matches!(
            verify_hs256("garbage", SECRET, NOW),
            Err(Error::TokenFormat)
        ));
        assert!(matches!(
            verify_hs256("a.b.c.d", SECRET, NOW),
            Err(Error::TokenFormat)
        ));
        assert!(verify_hs256("!!.??.##", SECRET, NOW).is_err());
    }

    #[test]
    fn rejects_alg_none() {
        let token = resign_with(
            r#"{"alg":"none","typ":"JWT"}"#,
            &serde_json::to_value(claims()).expect("claims serialize"),
        );
        assert!(matches!(
            verify_hs256(&token, SECRET, NOW),
            Err(Error::UnsupportedAlg(_))
        ));
    }

    #[test]
    fn rejects_missing_fields_and_unknown_role() {
        let header = r#"{"alg":"HS256","typ":"JWT"}"#;

        let no_subject = serde_json::json!({
            "sub": "", "email": "a@b.com", "role": "buyer", "iat": NOW, "exp": NOW + 60
        });
        assert!(matches!(
            verify_hs256(&resign_with(header, &no_subject), SECRET, NOW),
            Err(Error::MissingSubject)
        ));

        let bad_role = serde_json::json!({
            "sub": "1", "email": "a@b.com", "role": "root", "iat": NOW, "exp": NOW + 60
        });
        assert!(matches!(
            verify_hs256(&resign_with(header, &bad_role), SECRET, NOW),
            Err(Error::Json(_))
        ));

        let no_email = serde_json::json!({
            "sub": "1", "role": "buyer", "iat": NOW, "exp": NOW + 60
        });
        assert!(verify_hs256(&resign_with(header, &no_email), SECRET, NOW).is_err());
    }

    #[test]
    fn verifier_collapses_failures() -> Result<(), Error> {
        let verifier = verifier();
        let issued = verifier.issue("42", "buyer@example.com", Role::Buyer, NOW)?;
        assert_eq!(issued.expires_in, Duration::from_secs(3600));

        let claims = verifier.verify(&issued.token, NOW + 1);
        assert_eq!(claims.map(|c| c.role), Ok(Role::Buyer));

        assert_eq!(verifier.verify("garbage", NOW), Err(InvalidToken));
        assert_eq!(verifier.verify(&issued.token, NOW + 7200), Err(InvalidToken));
        Ok(())
    }

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!("Admin".parse::<Role>(), Ok(Role::Admin));
        assert_eq!(" farmer ".parse::<Role>(), Ok(Role::Farmer));
        assert!("owner".parse::<Role>().is_err());
        assert_eq!(Role::Buyer.to_string(), "buyer");
    }
}
