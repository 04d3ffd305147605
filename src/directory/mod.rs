//! Identity lookups for OTP flows and token issuance.

mod memory;
mod postgres;

pub use memory::MemoryDirectory;
pub use postgres::PgDirectory;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::token::Role;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("directory query failed: {0}")]
    Database(#[from] sqlx::Error),
    #[error("profile {id} has unknown role {role:?}")]
    UnknownRole { id: Uuid, role: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

#[async_trait]
pub trait Directory: Send + Sync {
    /// Look up a profile by normalized email.
    async fn find_identity(&self, email: &str) -> Result<Option<Profile>, DirectoryError>;

    /// Cheap reachability check for `/health`.
    async fn ping(&self) -> Result<(), DirectoryError>;
}
