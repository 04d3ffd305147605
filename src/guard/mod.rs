//! Ordered request gate for protected routes.
//!
//! Flow Overview:
//! 1) Resolve the client key and count the request against the admission window.
//! 2) Require `Authorization: Bearer <token>`.
//! 3) Verify the token into claims.
//! 4) Check the claim role against the route's allowed set, if it declares one.
//! 5) Attach the caller's [`Identity`] to the request and run the handler.
//!
//! The first failing step decides the response; later steps never run.

mod identity;

pub use identity::{AuthContext, Identity, MissingIdentity};

use axum::{
    Router,
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::{self, Next},
    response::{IntoResponse, Response},
};
use std::{
    net::SocketAddr,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};
use thiserror::Error;
use tracing::{info, warn};

use crate::admission::RateLimiter;
use crate::api::response::ApiError;
use crate::token::{Role, TokenVerifier};

const BEARER_PREFIX: &str = "Bearer ";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardError {
    #[error("rate limit exceeded")]
    RateLimited,
    #[error("authorization header is required")]
    MissingCredential,
    #[error("invalid authorization format")]
    MalformedCredential,
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("role {0} is not allowed")]
    Forbidden(Role),
}

/// Composes admission, token verification and role authorization.
pub struct AccessGuard {
    limiter: Arc<dyn RateLimiter>,
    verifier: Arc<TokenVerifier>,
    limit: u32,
}

impl AccessGuard {
    #[must_use]
    pub fn new(limiter: Arc<dyn RateLimiter>, verifier: Arc<TokenVerifier>, limit: u32) -> Self {
        Self {
            limiter,
            verifier,
            limit,
        }
    }

    #[must_use]
    pub fn limiter(&self) -> &dyn RateLimiter {
        self.limiter.as_ref()
    }

    #[must_use]
    pub fn verifier(&self) -> &TokenVerifier {
        &self.verifier
    }

    #[must_use]
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Count one request for the client.
    ///
    /// # Errors
    /// Returns `GuardError::RateLimited` once the client exhausted its window.
    pub fn admit(&self, client_key: &str) -> Result<(), GuardError> {
        if self.limiter.admit(client_key, self.limit).is_allowed() {
            Ok(())
        } else {
            warn!(client = client_key, limit = self.limit, "request rate limited");
            Err(GuardError::RateLimited)
        }
    }

    /// Run every gate step in order and return the caller's identity.
    ///
    /// # Errors
    /// Returns the first failing step as a `GuardError`.
    pub fn authorize(
        &self,
        client_key: &str,
        headers: &HeaderMap,
        required_roles: Option<&[Role]>,
        now_unix_seconds: i64,
    ) -> Result<Identity, GuardError> {
        self.admit(client_key)?;

        let token = bearer_token(headers)?;
        let claims = self
            .verifier
            .verify(token, now_unix_seconds)
            .map_err(|_| GuardError::InvalidToken)?;

        if let Some(roles) = required_roles {
            if !roles.contains(&claims.role) {
                info!(
                    subject = %claims.sub,
                    role = %claims.role,
                    "insufficient role for route"
                );
                return Err(GuardError::Forbidden(claims.role));
            }
        }

        Ok(Identity::from(claims))
    }
}

/// Extract the token from `Authorization: Bearer <token>`.
///
/// # Errors
/// Returns `MissingCredential` when the header is absent and `MalformedCredential` when the
/// scheme is not exactly `Bearer` or the token is empty.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, GuardError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(GuardError::MissingCredential)?
        .to_str()
        .map_err(|_| GuardError::MalformedCredential)?;
    if value.is_empty() {
        return Err(GuardError::MissingCredential);
    }
    let token = value
        .strip_prefix(BEARER_PREFIX)
        .ok_or(GuardError::MalformedCredential)?;
    if token.is_empty() {
        return Err(GuardError::MalformedCredential);
    }
    Ok(token)
}

/// Client key for admission: forwarded address, then real-ip, then the TCP peer.
#[must_use]
pub fn client_key<B>(request: &axum::http::Request<B>) -> String {
    if let Some(forwarded) = forwarded_client(request.headers()) {
        return forwarded;
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or_else(|| "unknown".to_string(), |info| info.0.ip().to_string())
}

fn forwarded_client(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if forwarded.is_some() {
        return forwarded.map(str::to_string);
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

pub(crate) fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| {
            i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX)
        })
}

#[derive(Clone)]
struct Gate {
    guard: Arc<AccessGuard>,
    roles: Option<Arc<[Role]>>,
}

async fn access_gate(State(gate): State<Gate>, mut request: Request, next: Next) -> Response {
    let key = client_key(&request);
    match gate
        .guard
        .authorize(&key, request.headers(), gate.roles.as_deref(), unix_now())
    {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(err) => ApiError::from(err).into_response(),
    }
}

async fn admission_gate(
    State(guard): State<Arc<AccessGuard>>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_key(&request);
    match guard.admit(&key) {
        Ok(()) => next.run(request).await,
        Err(err) => ApiError::from(err).into_response(),
    }
}

/// Wrap every route of `router` with the full access gate.
///
/// `roles = None` admits any authenticated caller.
#[must_use]
pub fn protect<S>(router: Router<S>, guard: &Arc<AccessGuard>, roles: Option<&[Role]>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let gate = Gate {
        guard: Arc::clone(guard),
        roles: roles.map(Arc::from),
    };
    router.route_layer(middleware::from_fn_with_state(gate, access_gate))
}

/// Wrap every route of `router` with admission counting only.
#[must_use]
pub fn admit_only<S>(router: Router<S>, guard: &Arc<AccessGuard>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.route_layer(middleware::from_fn_with_state(
        Arc::clone(guard),
        admission_gate,
    ))
}
