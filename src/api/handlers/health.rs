use axum::{
    extract::Extension,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error};
use utoipa::ToSchema;

use crate::{
    GIT_COMMIT_HASH,
    api::{response::ApiResponse, state::AppState},
};

#[derive(ToSchema, Serialize, Debug)]
pub struct Health {
    commit: String,
    name: String,
    version: String,
    directory: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Directory is reachable", body = Health),
        (status = 503, description = "Directory is unreachable", body = Health)
    ),
    tag = "health"
)]
pub async fn health(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    let directory = state.directory().ping().await;
    if let Err(err) = &directory {
        error!("Failed to reach directory: {err}");
    }

    let health = Health {
        commit: GIT_COMMIT_HASH.to_string(),
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        directory: if directory.is_ok() {
            "ok".to_string()
        } else {
            "error".to_string()
        },
    };

    let short_hash = health.commit.get(..7).unwrap_or_default();
    let mut headers = HeaderMap::new();
    match format!("{}:{}:{}", health.name, health.version, short_hash).parse::<HeaderValue>() {
        Ok(value) => {
            debug!("X-App header: {:?}", value);
            headers.insert("X-App", value);
        }
        Err(err) => error!("Failed to parse X-App header: {}", err),
    }

    let response = if directory.is_ok() {
        ApiResponse::ok("Service is healthy", health)
    } else {
        ApiResponse::ok("Service is degraded", health).with_status(StatusCode::SERVICE_UNAVAILABLE)
    };
    (headers, response)
}
