/// Identity aggregate and its storage seam
///
/// The identity record carries the credential digest and the single active
/// refresh-token slot. Storage backends implement `IdentityStore`.

mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{AppError, ValidationError};

pub use memory::InMemoryIdentityStore;
pub use postgres::PgIdentityStore;

/// Permission class of an identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }

    pub fn parse(value: &str) -> Result<Self, AppError> {
        match value {
            "USER" => Ok(Role::User),
            "ADMIN" => Ok(Role::Admin),
            other => Err(AppError::Validation(ValidationError::InvalidFormat(format!(
                "role '{}'",
                other
            )))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Digest and expiry of the refresh token currently bound to an identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub digest: String,
    pub expires_at: DateTime<Utc>,
}

/// The authenticated principal
#[derive(Debug, Clone)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: Role,
    pub refresh_token: Option<RefreshTokenRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Identity {
    /// Build a freshly registered identity with no active session
    pub fn new(email: String, name: String, password_hash: String, role: Role) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email,
            name,
            password_hash,
            role,
            refresh_token: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Persistence collaborator for identities.
///
/// Refresh-token mutations are single statements: `set_refresh_token`
/// overwrites unconditionally, `swap_refresh_token` only writes when the stored
/// digest still equals `expected_digest`. Rotation relies on the latter so that
/// two callers presenting the same token cannot both win.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Persist a new identity. Duplicate emails fail with a unique violation.
    async fn insert(&self, identity: &Identity) -> Result<(), AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, AppError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, AppError>;

    /// Find the identity whose current refresh digest equals `digest`
    async fn find_by_refresh_token(&self, digest: &str) -> Result<Option<Identity>, AppError>;

    /// Overwrite (or clear, with `None`) the refresh slot.
    /// Returns `false` when no identity has this id.
    async fn set_refresh_token(
        &self,
        id: Uuid,
        record: Option<RefreshTokenRecord>,
    ) -> Result<bool, AppError>;

    /// Compare-and-swap on the refresh slot.
    /// Returns `true` only if the stored digest matched and was replaced.
    async fn swap_refresh_token(
        &self,
        id: Uuid,
        expected_digest: &str,
        next: Option<RefreshTokenRecord>,
    ) -> Result<bool, AppError>;
}
