use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Directory, DirectoryError, Profile};
use crate::otp::normalize_email;
use crate::token::Role;

/// In-process directory for local runs and tests.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    profiles: RwLock<HashMap<String, Profile>>,
}

impl MemoryDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a profile and return it.
    pub async fn insert(&self, email: &str, role: Role) -> Profile {
        let email = normalize_email(email);
        let profile = Profile {
            id: Uuid::now_v7(),
            email: email.clone(),
            role,
        };
        self.profiles.write().await.insert(email, profile.clone());
        profile
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn find_identity(&self, email: &str) -> Result<Option<Profile>, DirectoryError> {
        Ok(self
            .profiles
            .read()
            .await
            .get(&normalize_email(email))
            .cloned())
    }

    async fn ping(&self) -> Result<(), DirectoryError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn finds_profiles_case_insensitively() {
        let directory = MemoryDirectory::new();
        let inserted = directory.insert("Farmer@Example.com", Role::Farmer).await;

        let found = directory
            .find_identity("farmer@example.COM")
            .await
            .expect("memory lookup");
        assert_eq!(found, Some(inserted));
        assert!(
            directory
                .find_identity("nobody@example.com")
                .await
                .expect("memory lookup")
                .is_none()
        );
        assert!(directory.ping().await.is_ok());
    }
}
