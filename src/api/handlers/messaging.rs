//! Direct message delivery for admins.

use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

use super::{parse_body, require_field};
use crate::api::{
    response::{ApiError, ApiResponse, ErrorBody},
    state::AppState,
};
use crate::delivery::{self, EmailMessage};
use crate::guard::Identity;
use crate::otp::checked_email;

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendEmailRequest {
    pub to: String,
    pub subject: String,
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendChatRequest {
    /// Recipient phone number or chat identifier.
    pub to: String,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Sent {
    pub to: String,
}

#[utoipa::path(
    post,
    path = "/api/v1/mailer/send",
    request_body = SendEmailRequest,
    responses(
        (status = 200, description = "Email accepted by the transport", body = Sent),
        (status = 400, description = "Invalid recipient or empty message", body = ErrorBody),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorBody),
        (status = 403, description = "Caller is not an admin", body = ErrorBody),
        (status = 502, description = "Delivery failed", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "messaging"
)]
pub async fn send_email(
    identity: Identity,
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<SendEmailRequest>, JsonRejection>,
) -> Result<ApiResponse<Sent>, ApiError> {
    let request = parse_body(payload)?;
    let to = checked_email(&request.to)?;
    let subject = require_field("subject", &request.subject)?.to_string();
    if request.html.trim().is_empty() && request.text.trim().is_empty() {
        return Err(ApiError::invalid_request("Either html or text is required"));
    }

    let message = EmailMessage {
        to,
        subject,
        html: request.html,
        text: request.text,
    };
    delivery::with_timeout(state.delivery_timeout(), state.mailer().deliver(&message)).await?;
    info!(actor = %identity.subject_id, to_email = %message.to, "email sent");

    Ok(ApiResponse::ok("Email sent", Sent { to: message.to }))
}

#[utoipa::path(
    post,
    path = "/api/v1/whatsapp/send",
    request_body = SendChatRequest,
    responses(
        (status = 200, description = "Message accepted by the transport", body = Sent),
        (status = 400, description = "Missing recipient or message", body = ErrorBody),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorBody),
        (status = 403, description = "Caller is not an admin", body = ErrorBody),
        (status = 502, description = "Delivery failed", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "messaging"
)]
pub async fn send_chat(
    identity: Identity,
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<SendChatRequest>, JsonRejection>,
) -> Result<ApiResponse<Sent>, ApiError> {
    let request = parse_body(payload)?;
    let to = require_field("to", &request.to)?;
    let body = require_field("message", &request.message)?;

    delivery::with_timeout(
        state.delivery_timeout(),
        state.messenger().send_message(to, body),
    )
    .await?;
    info!(actor = %identity.subject_id, recipient = to, "chat message sent");

    Ok(ApiResponse::ok("Message sent", Sent { to: to.to_string() }))
}
