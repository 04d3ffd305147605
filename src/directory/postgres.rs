use async_trait::async_trait;
use sqlx::{Connection, PgPool, Row};
use tracing::{Instrument, info_span};
use uuid::Uuid;

use super::{Directory, DirectoryError, Profile};
use crate::token::Role;

/// Reads `profiles(id, email, role)`.
#[derive(Clone, Debug)]
pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Directory for PgDirectory {
    async fn find_identity(&self, email: &str) -> Result<Option<Profile>, DirectoryError> {
        let query_span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.sql.table = "profiles"
        );
        let row = sqlx::query(
            r"
            SELECT id, email, role
            FROM profiles
            WHERE lower(email) = $1
            LIMIT 1
            ",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .instrument(query_span)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let id: Uuid = row.try_get("id")?;
        let role: String = row.try_get("role")?;
        let role = role
            .parse::<Role>()
            .map_err(|_| DirectoryError::UnknownRole { id, role })?;

        Ok(Some(Profile {
            id,
            email: row.try_get("email")?,
            role,
        }))
    }

    async fn ping(&self) -> Result<(), DirectoryError> {
        let acquire_span = info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        let mut conn = self.pool.acquire().instrument(acquire_span).await?;
        let ping_span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        conn.ping().instrument(ping_span).await?;
        Ok(())
    }
}
