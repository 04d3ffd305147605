//! Public OTP endpoints.
//!
//! Both routes sit behind admission counting but not behind the bearer gate: they are how a
//! caller obtains a bearer token in the first place.

use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;

use super::{parse_body, parse_purpose, require_field};
use crate::api::{
    response::{ApiError, ApiResponse, ErrorBody},
    state::AppState,
};
use crate::guard::unix_now;
use crate::otp::{OtpError, Purpose, Verification, checked_email};

const REQUESTED_MESSAGE: &str = "If the address can receive codes, a code has been sent";

#[derive(Debug, Deserialize, ToSchema)]
pub struct OtpRequest {
    pub email: String,
    /// One of `login`, `password-reset`, `verification`, `registration`.
    pub purpose: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OtpRequested {
    pub email: String,
    pub purpose: Purpose,
    pub expires_in: u64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OtpVerifyRequest {
    pub email: String,
    pub purpose: String,
    pub code: String,
}

/// Token fields are only present for login codes.
#[derive(Debug, Serialize, ToSchema)]
pub struct OtpVerified {
    pub email: String,
    pub purpose: Purpose,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

/// Request a code. Login and password-reset codes are only sent to known identities, but the
/// response does not reveal whether one was.
#[utoipa::path(
    post,
    path = "/v1/otp/request",
    request_body = OtpRequest,
    responses(
        (status = 200, description = "Request accepted", body = OtpRequested),
        (status = 400, description = "Invalid email or purpose", body = ErrorBody),
        (status = 429, description = "Rate limited", body = ErrorBody),
        (status = 502, description = "Code stored but delivery failed", body = ErrorBody)
    ),
    tag = "otp"
)]
pub async fn request_otp(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<OtpRequest>, JsonRejection>,
) -> Result<ApiResponse<OtpRequested>, ApiError> {
    let request = parse_body(payload)?;
    let purpose = parse_purpose(&request.purpose)?;
    let email = checked_email(&request.email)?;
    let accepted = OtpRequested {
        email: email.clone(),
        purpose,
        expires_in: state.issuer().config().ttl_for(purpose).as_secs(),
    };

    let known = !purpose.requires_known_identity()
        || state.directory().find_identity(&email).await?.is_some();
    if !known {
        info!(purpose = %purpose, "otp requested for unknown identity");
        return Ok(ApiResponse::ok(REQUESTED_MESSAGE, accepted));
    }

    let issued = state.issuer().issue(&email, purpose).await?;
    issued.delivery?;
    Ok(ApiResponse::ok(REQUESTED_MESSAGE, accepted))
}

/// Verify a code. A valid login code is exchanged for a bearer token.
#[utoipa::path(
    post,
    path = "/v1/otp/verify",
    request_body = OtpVerifyRequest,
    responses(
        (status = 200, description = "Code verified", body = OtpVerified),
        (status = 400, description = "Invalid email or purpose", body = ErrorBody),
        (status = 401, description = "Invalid or expired code", body = ErrorBody),
        (status = 404, description = "No active code", body = ErrorBody),
        (status = 429, description = "Rate limited", body = ErrorBody)
    ),
    tag = "otp"
)]
pub async fn verify_otp(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<OtpVerifyRequest>, JsonRejection>,
) -> Result<ApiResponse<OtpVerified>, ApiError> {
    let request = parse_body(payload)?;
    let purpose = parse_purpose(&request.purpose)?;
    let code = require_field("code", &request.code)?;
    let email = checked_email(&request.email)?;

    match state.issuer().verify(&email, purpose, code).await? {
        Verification::Valid => {}
        Verification::Expired => {
            return Err(ApiError::Unauthenticated("Code expired".to_string()));
        }
        Verification::Invalid => {
            return Err(ApiError::Unauthenticated("Invalid code".to_string()));
        }
        Verification::NotFound => return Err(OtpError::NoActiveRecord.into()),
    }

    let mut verified = OtpVerified {
        email,
        purpose,
        token: None,
        token_type: None,
        expires_in: None,
    };
    if purpose == Purpose::Login {
        let (token, expires_in) = login_token(&state, &verified.email).await?;
        verified.token = Some(token);
        verified.token_type = Some("Bearer".to_string());
        verified.expires_in = Some(expires_in);
    }

    Ok(ApiResponse::ok("Code verified", verified))
}

/// Sign a bearer token for the verified identity. Returns the token and its lifetime in seconds.
async fn login_token(state: &AppState, email: &str) -> Result<(String, u64), ApiError> {
    let profile = state.directory().find_identity(email).await?.ok_or_else(|| {
        // The code was only issued because the identity existed.
        info!("verified login code for an identity that no longer exists");
        ApiError::Unauthenticated("Invalid code".to_string())
    })?;

    let issued = state
        .guard()
        .verifier()
        .issue(
            &profile.id.to_string(),
            &profile.email,
            profile.role,
            unix_now(),
        )
        .map_err(|err| {
            error!("Failed to sign bearer token: {err}");
            ApiError::Internal
        })?;

    Ok((issued.token, issued.expires_in.as_secs()))
}
