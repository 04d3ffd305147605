//! Request-scoped identity attached by the access guard.

use axum::{extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use thiserror::Error;
use utoipa::ToSchema;

use crate::api::response::ApiError;
use crate::token::{Claims, Role};

/// Identity of an authenticated caller. Read-only once attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Identity {
    pub subject_id: String,
    pub email: String,
    pub role: Role,
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Self {
            subject_id: claims.sub,
            email: claims.email,
            role: claims.role,
        }
    }
}

/// Identity was requested on a path the guard never authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("identity not found in request context")]
pub struct MissingIdentity;

impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or_else(|| MissingIdentity.into())
    }
}

/// Optional view of the request identity with explicit accessors.
#[derive(Debug, Clone, Default)]
pub struct AuthContext(Option<Identity>);

impl AuthContext {
    #[must_use]
    pub fn new(identity: Option<Identity>) -> Self {
        Self(identity)
    }

    /// # Errors
    /// Returns `MissingIdentity` outside an authenticated path.
    pub fn identity(&self) -> Result<&Identity, MissingIdentity> {
        self.0.as_ref().ok_or(MissingIdentity)
    }

    /// # Errors
    /// Returns `MissingIdentity` outside an authenticated path.
    pub fn subject_id(&self) -> Result<&str, MissingIdentity> {
        self.identity().map(|identity| identity.subject_id.as_str())
    }

    /// # Errors
    /// Returns `MissingIdentity` outside an authenticated path.
    pub fn email(&self) -> Result<&str, MissingIdentity> {
        self.identity().map(|identity| identity.email.as_str())
    }

    /// # Errors
    /// Returns `MissingIdentity` outside an authenticated path.
    pub fn role(&self) -> Result<Role, MissingIdentity> {
        self.identity().map(|identity| identity.role)
    }
}

impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<Identity>().cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn identity() -> Identity {
        Identity {
            subject_id: "user-1".to_string(),
            email: "buyer@example.com".to_string(),
            role: Role::Buyer,
        }
    }

    #[test]
    fn accessors_fail_without_identity() {
        let context = AuthContext::default();
        assert_eq!(context.subject_id(), Err(MissingIdentity));
        assert_eq!(context.email(), Err(MissingIdentity));
        assert_eq!(context.role(), Err(MissingIdentity));
    }

    #[test]
    fn accessors_return_attached_identity() {
        let context = AuthContext::new(Some(identity()));
        assert_eq!(context.subject_id(), Ok("user-1"));
        assert_eq!(context.email(), Ok("buyer@example.com"));
        assert_eq!(context.role(), Ok(Role::Buyer));
    }

    #[test]
    fn identity_from_claims() {
        let claims = Claims {
            sub: "user-1".to_string(),
            email: "buyer@example.com".to_string(),
            role: Role::Buyer,
            iat: 0,
            exp: 10,
        };
        assert_eq!(Identity::from(claims), identity());
    }

    #[tokio::test]
    async fn extractor_reads_request_extensions() {
        let (mut parts, ()) = Request::builder()
            .uri("/")
            .body(())
            .expect("valid request")
            .into_parts();

        let missing = Identity::from_request_parts(&mut parts, &()).await;
        assert!(missing.is_err());

        parts.extensions.insert(identity());
        let found = Identity::from_request_parts(&mut parts, &()).await;
        assert_eq!(found.ok(), Some(identity()));

        let context = AuthContext::from_request_parts(&mut parts, &()).await;
        let subject = context
            .ok()
            .and_then(|context| context.subject_id().ok().map(str::to_string));
        assert_eq!(subject.as_deref(), Some("user-1"));
    }
}
