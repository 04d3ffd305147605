//! Admin-only endpoints: custom OTP issuance, resend and admission introspection.

use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

use super::{parse_body, parse_purpose, require_field};
use crate::admission::DEFAULT_WINDOW;
use crate::api::{
    response::{ApiError, ApiResponse, ErrorBody},
    state::AppState,
};
use crate::guard::Identity;
use crate::otp::Purpose;

#[derive(Debug, Deserialize, ToSchema)]
pub struct IssueOtpRequest {
    pub email: String,
    pub purpose: String,
    pub subject: String,
    /// Must contain `{{code}}` and `{{purpose}}` exactly once each.
    pub html: String,
    /// Must contain `{{code}}` and `{{purpose}}` exactly once each.
    pub text: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct IssuedOtp {
    pub email: String,
    pub purpose: Purpose,
    pub code: String,
    pub expires_in: u64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResendOtpRequest {
    pub email: String,
    pub purpose: String,
    pub code: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ResentOtp {
    pub email: String,
    pub purpose: Purpose,
    pub expires_in: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdmissionStatus {
    pub tracked_clients: usize,
    pub limit: u32,
    pub window_seconds: u64,
}

#[utoipa::path(
    post,
    path = "/api/v1/otp/issue",
    request_body = IssueOtpRequest,
    responses(
        (status = 201, description = "Code issued and delivered", body = IssuedOtp),
        (status = 400, description = "Invalid email, purpose or template", body = ErrorBody),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorBody),
        (status = 403, description = "Caller is not an admin", body = ErrorBody),
        (status = 502, description = "Code stored but delivery failed", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn issue_otp(
    identity: Identity,
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<IssueOtpRequest>, JsonRejection>,
) -> Result<ApiResponse<IssuedOtp>, ApiError> {
    let request = parse_body(payload)?;
    let purpose = parse_purpose(&request.purpose)?;
    let issued = state
        .issuer()
        .issue_with_template(
            &request.email,
            purpose,
            &request.subject,
            &request.html,
            &request.text,
        )
        .await?;
    info!(
        actor = %identity.subject_id,
        email = %issued.record.email,
        purpose = %purpose,
        "otp issued with custom template"
    );
    issued.delivery?;

    Ok(ApiResponse::created(
        "Code issued",
        IssuedOtp {
            email: issued.record.email.clone(),
            purpose,
            code: issued.record.code().to_string(),
            expires_in: issued.record.remaining().as_secs(),
        },
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/otp/resend",
    request_body = ResendOtpRequest,
    responses(
        (status = 200, description = "Code delivered again", body = ResentOtp),
        (status = 400, description = "Invalid email or purpose", body = ErrorBody),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorBody),
        (status = 403, description = "Caller is not an admin", body = ErrorBody),
        (status = 404, description = "No active code matches", body = ErrorBody),
        (status = 502, description = "Delivery failed", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn resend_otp(
    identity: Identity,
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<ResendOtpRequest>, JsonRejection>,
) -> Result<ApiResponse<ResentOtp>, ApiError> {
    let request = parse_body(payload)?;
    let purpose = parse_purpose(&request.purpose)?;
    let code = require_field("code", &request.code)?;
    let record = state
        .issuer()
        .resend(&request.email, purpose, code)
        .await?;
    info!(actor = %identity.subject_id, email = %record.email, purpose = %purpose, "otp resent");

    Ok(ApiResponse::ok(
        "Code resent",
        ResentOtp {
            expires_in: record.remaining().as_secs(),
            email: record.email,
            purpose,
        },
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/admission",
    responses(
        (status = 200, description = "Admission tracker status", body = AdmissionStatus),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorBody),
        (status = 403, description = "Caller is not an admin", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn admission_status(
    Extension(state): Extension<Arc<AppState>>,
) -> ApiResponse<AdmissionStatus> {
    let guard = state.guard();
    ApiResponse::ok(
        "Admission status",
        AdmissionStatus {
            tracked_clients: guard.limiter().tracked_clients(),
            limit: guard.limit(),
            window_seconds: DEFAULT_WINDOW.as_secs(),
        },
    )
}
