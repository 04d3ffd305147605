use tracing::debug;

use crate::api::response::{ApiError, ApiResponse, ErrorBody};
use crate::guard::{AuthContext, Identity};

#[utoipa::path(
    get,
    path = "/api/v1/me",
    responses(
        (status = 200, description = "Identity of the caller", body = Identity),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorBody),
        (status = 429, description = "Rate limited", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "identity"
)]
pub async fn me(context: AuthContext) -> Result<ApiResponse<Identity>, ApiError> {
    let identity = Identity {
        subject_id: context.subject_id()?.to_string(),
        email: context.email()?.to_string(),
        role: context.role()?,
    };
    debug!(subject = %identity.subject_id, "identity requested");
    Ok(ApiResponse::ok("Authenticated", identity))
}
