//! Uniform wire envelopes.
//!
//! Success: `{success: true, message, data}`. Failure: `{error, message, code}` where
//! `error` is the canonical reason phrase of `code`. Every `ApiError` variant maps to exactly
//! one status code.

use axum::{
    Json,
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::any::Any;
use thiserror::Error;
use tracing::{error, warn};
use utoipa::ToSchema;

use crate::delivery::DeliveryError;
use crate::directory::DirectoryError;
use crate::guard::{GuardError, MissingIdentity};
use crate::otp::OtpError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited,
    #[error("{0}")]
    Unauthenticated(String),
    #[error("Insufficient permissions for this action")]
    Forbidden,
    #[error("{0}")]
    InvalidRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    DeliveryFailed(String),
    #[error("Request timed out")]
    Timeout,
    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::DeliveryFailed(_) => StatusCode::BAD_GATEWAY,
            Self::Timeout => StatusCode::REQUEST_TIMEOUT,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    pub code: u16,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.to_string(),
            code: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

/// Success envelope. `data` is omitted from the wire when empty.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    #[serde(skip)]
    status: StatusCode,
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            status: StatusCode::OK,
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            ..Self::ok(message, data)
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            success: true,
            message: message.into(),
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

impl From<GuardError> for ApiError {
    fn from(err: GuardError) -> Self {
        match err {
            GuardError::RateLimited => Self::RateLimited,
            GuardError::MissingCredential => {
                Self::Unauthenticated("Authorization header is required".to_string())
            }
            GuardError::MalformedCredential => Self::Unauthenticated(
                "Invalid authorization format. Use: Bearer <token>".to_string(),
            ),
            GuardError::InvalidToken => {
                Self::Unauthenticated("Invalid or expired token".to_string())
            }
            GuardError::Forbidden(_) => Self::Forbidden,
        }
    }
}

impl From<MissingIdentity> for ApiError {
    fn from(_: MissingIdentity) -> Self {
        Self::Unauthenticated("Authentication required".to_string())
    }
}

impl From<OtpError> for ApiError {
    fn from(err: OtpError) -> Self {
        match err {
            OtpError::InvalidEmail | OtpError::Template(_) => Self::InvalidRequest(err.to_string()),
            OtpError::NoActiveRecord => Self::NotFound(err.to_string()),
            OtpError::Delivery(source) => Self::from(source),
        }
    }
}

impl From<DeliveryError> for ApiError {
    fn from(err: DeliveryError) -> Self {
        warn!("delivery failed: {err}");
        Self::DeliveryFailed(format!("Delivery failed: {err}"))
    }
}

impl From<DirectoryError> for ApiError {
    fn from(err: DirectoryError) -> Self {
        error!("directory failure: {err}");
        Self::Internal
    }
}

/// Convert a caught handler panic into the internal error envelope.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(panic = detail, "panic recovered");
    ApiError::Internal.into_response()
}

/// Give the bare 408 produced by the request timeout layer the error envelope.
pub async fn timeout_response(response: Response) -> Response {
    if response.status() == StatusCode::REQUEST_TIMEOUT
        && !response.headers().contains_key(CONTENT_TYPE)
    {
        warn!("request timed out");
        return ApiError::Timeout.into_response();
    }
    response
}

/// Fallback for unknown routes.
pub async fn route_not_found() -> ApiError {
    ApiError::not_found("Route not found")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap_or_default();
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    }

    #[test]
    fn every_error_kind_has_one_status() {
        let cases = [
            (ApiError::RateLimited, 429),
            (ApiError::Unauthenticated(String::new()), 401),
            (ApiError::Forbidden, 403),
            (ApiError::invalid_request("bad"), 400),
            (ApiError::not_found("gone"), 404),
            (ApiError::DeliveryFailed(String::new()), 502),
            (ApiError::Timeout, 408),
            (ApiError::Internal, 500),
        ];
        for (err, code) in cases {
            assert_eq!(err.status().as_u16(), code, "{err:?}");
        }
    }

    #[tokio::test]
    async fn error_envelope_shape() {
        let response = ApiError::RateLimited.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Too Many Requests");
        assert_eq!(body["code"], 429);
        assert_eq!(body["message"], "Rate limit exceeded. Please try again later.");
        assert!(body.get("data").is_none());
    }

    #[tokio::test]
    async fn success_envelope_shape() {
        let response = ApiResponse::ok("done", serde_json::json!({"k": 1})).into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "done");
        assert_eq!(body["data"]["k"], 1);

        let response = ApiResponse::message("empty").into_response();
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert!(body.get("data").is_none());
    }

    #[tokio::test]
    async fn created_keeps_payload() {
        let response = ApiResponse::created("made", 7).into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(body_json(response).await["data"], 7);
    }

    #[test]
    fn guard_errors_map_to_auth_statuses() {
        assert_eq!(
            ApiError::from(GuardError::MissingCredential).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(GuardError::InvalidToken).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(GuardError::Forbidden(crate::token::Role::Buyer)).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(GuardError::RateLimited).status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[tokio::test]
    async fn panic_becomes_internal_error() {
        let response = panic_response(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["code"], 500);
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_request_gets_error_envelope() {
        use axum::{Router, body::Body, http::Request, middleware::map_response, routing::get};
        use std::time::Duration;
        use tower::{ServiceBuilder, ServiceExt};
        use tower_http::timeout::TimeoutLayer;

        let app = Router::new()
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "late"
                }),
            )
            .layer(
                ServiceBuilder::new()
                    .layer(map_response(timeout_response))
                    .layer(TimeoutLayer::new(Duration::from_secs(1))),
            );

        let request = Request::builder()
            .uri("/slow")
            .body(Body::empty())
            .expect("valid request");
        let response = match app.oneshot(request).await {
            Ok(response) => response,
            Err(err) => match err {},
        };
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Request Timeout");
        assert_eq!(body["message"], "Request timed out");
        assert_eq!(body["code"], 408);
    }

    #[tokio::test]
    async fn handler_408_with_body_is_left_alone() {
        let response = (StatusCode::REQUEST_TIMEOUT, Json(serde_json::json!({"k": 1})))
            .into_response();
        let response = timeout_response(response).await;
        assert_eq!(body_json(response).await["k"], 1);
    }
}
