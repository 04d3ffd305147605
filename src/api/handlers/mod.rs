pub mod admin;
pub mod health;
pub mod me;
pub mod messaging;
pub mod otp;

use axum::{Json, extract::rejection::JsonRejection};

use crate::api::response::ApiError;
use crate::otp::Purpose;

/// Unwrap a JSON body, turning rejections into the error envelope.
pub(crate) fn parse_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::invalid_request(rejection.body_text()))
}

pub(crate) fn parse_purpose(value: &str) -> Result<Purpose, ApiError> {
    value.parse().map_err(ApiError::InvalidRequest)
}

pub(crate) fn require_field<'a>(name: &str, value: &'a str) -> Result<&'a str, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ApiError::invalid_request(format!("Missing {name}")))
    } else {
        Ok(trimmed)
    }
}
