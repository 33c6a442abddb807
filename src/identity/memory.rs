/// In-process identity store
///
/// Backed by a `tokio::sync::RwLock<HashMap>`; every mutation happens under the
/// write lock, which is what makes `swap_refresh_token` atomic.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use subtle::ConstantTimeEq;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Identity, IdentityStore, RefreshTokenRecord};
use crate::error::{AppError, DatabaseError};

#[derive(Debug, Default)]
pub struct InMemoryIdentityStore {
    identities: RwLock<HashMap<Uuid, Identity>>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of identities currently holding a refresh token
    pub async fn active_sessions(&self) -> usize {
        self.identities
            .read()
            .await
            .values()
            .filter(|identity| identity.refresh_token.is_some())
            .count()
    }
}

fn digest_matches(stored: &Option<RefreshTokenRecord>, digest: &str) -> bool {
    match stored {
        Some(record) => bool::from(record.digest.as_bytes().ct_eq(digest.as_bytes())),
        None => false,
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentityStore {
    async fn insert(&self, identity: &Identity) -> Result<(), AppError> {
        let mut identities = self.identities.write().await;

        if identities.values().any(|existing| existing.email == identity.email) {
            return Err(AppError::Database(DatabaseError::UniqueConstraintViolation(
                "email".to_string(),
            )));
        }

        identities.insert(identity.id, identity.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, AppError> {
        Ok(self.identities.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, AppError> {
        Ok(self
            .identities
            .read()
            .await
            .values()
            .find(|identity| identity.email == email)
            .cloned())
    }

    async fn find_by_refresh_token(&self, digest: &str) -> Result<Option<Identity>, AppError> {
        Ok(self
            .identities
            .read()
            .await
            .values()
            .find(|identity| digest_matches(&identity.refresh_token, digest))
            .cloned())
    }

    async fn set_refresh_token(
        &self,
        id: Uuid,
        record: Option<RefreshTokenRecord>,
    ) -> Result<bool, AppError> {
        let mut identities = self.identities.write().await;
        match identities.get_mut(&id) {
            Some(identity) => {
                identity.refresh_token = record;
                identity.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn swap_refresh_token(
        &self,
        id: Uuid,
        expected_digest: &str,
        next: Option<RefreshTokenRecord>,
    ) -> Result<bool, AppError> {
        let mut identities = self.identities.write().await;
        match identities.get_mut(&id) {
            Some(identity) if digest_matches(&identity.refresh_token, expected_digest) => {
                identity.refresh_token = next;
                identity.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Role;
    use chrono::Duration;

    fn identity(email: &str) -> Identity {
        Identity::new(email.to_string(), "alice".to_string(), "hash".to_string(), Role::User)
    }

    fn record(digest: &str) -> RefreshTokenRecord {
        RefreshTokenRecord {
            digest: digest.to_string(),
            expires_at: Utc::now() + Duration::days(7),
        }
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_email() {
        let store = InMemoryIdentityStore::new();
        store.insert(&identity("alice@example.com")).await.unwrap();

        let result = store.insert(&identity("alice@example.com")).await;
        assert!(matches!(
            result,
            Err(AppError::Database(DatabaseError::UniqueConstraintViolation(_)))
        ));
    }

    #[tokio::test]
    async fn test_lookup_by_email_and_digest() {
        let store = InMemoryIdentityStore::new();
        let alice = identity("alice@example.com");
        store.insert(&alice).await.unwrap();
        assert!(store.set_refresh_token(alice.id, Some(record("abc"))).await.unwrap());

        let by_email = store.find_by_email("alice@example.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, alice.id);

        let by_digest = store.find_by_refresh_token("abc").await.unwrap().unwrap();
        assert_eq!(by_digest.id, alice.id);
        assert!(store.find_by_refresh_token("abd").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_refresh_token_reports_missing_identity() {
        let store = InMemoryIdentityStore::new();
        assert!(!store.set_refresh_token(Uuid::new_v4(), None).await.unwrap());
    }

    #[tokio::test]
    async fn test_swap_only_applies_on_matching_digest() {
        let store = InMemoryIdentityStore::new();
        let alice = identity("alice@example.com");
        store.insert(&alice).await.unwrap();
        store.set_refresh_token(alice.id, Some(record("first"))).await.unwrap();

        assert!(!store
            .swap_refresh_token(alice.id, "stale", Some(record("second")))
            .await
            .unwrap());
        assert!(store
            .swap_refresh_token(alice.id, "first", Some(record("second")))
            .await
            .unwrap());
        assert!(!store
            .swap_refresh_token(alice.id, "first", Some(record("third")))
            .await
            .unwrap());

        let stored = store.find_by_id(alice.id).await.unwrap().unwrap();
        assert_eq!(stored.refresh_token.unwrap().digest, "second");
        assert_eq!(store.active_sessions().await, 1);
    }
}
