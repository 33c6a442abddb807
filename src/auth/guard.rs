/// Access Guard
///
/// Turns a bearer access token into an authenticated identity: stateless
/// token verification, then a lookup confirming the subject still exists.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::jwt::TokenCodec;
use crate::error::{AppError, AuthError};
use crate::identity::{Identity, IdentityStore, Role};

/// Identity attached to a request once its access token checks out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedIdentity {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<&Identity> for AuthenticatedIdentity {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id,
            email: identity.email.clone(),
            name: identity.name.clone(),
            role: identity.role,
            created_at: identity.created_at,
        }
    }
}

#[derive(Clone)]
pub struct AccessGuard {
    codec: TokenCodec,
    store: Arc<dyn IdentityStore>,
}

impl AccessGuard {
    pub fn new(codec: TokenCodec, store: Arc<dyn IdentityStore>) -> Self {
        Self { codec, store }
    }

    /// # Errors
    /// - `MissingToken` for an empty token
    /// - `MalformedToken` / `InvalidSignature` / `TokenExpired` from the codec
    /// - `UserNotFound` when the subject no longer exists
    /// - Store failures
    pub async fn authenticate(&self, token: &str) -> Result<AuthenticatedIdentity, AppError> {
        if token.is_empty() {
            return Err(AppError::Auth(AuthError::MissingToken));
        }

        let claims = self.codec.verify(token)?;
        let subject_id = claims.subject_id()?;

        let identity = self
            .store
            .find_by_id(subject_id)
            .await?
            .ok_or(AppError::Auth(AuthError::UserNotFound))?;

        Ok(AuthenticatedIdentity::from(&identity))
    }
}
