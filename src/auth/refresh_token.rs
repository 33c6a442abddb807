/// Refresh Token Management
///
/// Handles refresh token generation, rotation and revocation.
/// Refresh tokens are:
/// - Cryptographically secure random 64-character alphanumeric strings
/// - Hashed with SHA-256 before storage (the raw value is never persisted)
/// - Bound one-per-identity: issuing a new one replaces the previous
/// - Rotated on every use through a compare-and-swap on the stored digest

use chrono::Duration;
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use sha2::{Digest, Sha256};
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::clock::Clock;
use crate::error::{AppError, AuthError};
use crate::identity::{IdentityStore, RefreshTokenRecord};

pub const REFRESH_TOKEN_LENGTH: usize = 64;

/// Generate a new cryptographically secure refresh token
///
/// 64 characters drawn from a 62-symbol alphabet (~381 bits of entropy),
/// sampled from the thread-local CSPRNG.
pub fn generate_refresh_token() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(REFRESH_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// Hash a refresh token using SHA-256
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Result of a successful rotation
#[derive(Debug, Clone)]
pub struct RotatedRefreshToken {
    pub identity_id: Uuid,
    pub refresh_token: String,
}

/// Store mutations run as their own task. If the caller's future is dropped
/// mid-flight (client disconnect) the write still completes.
async fn run_to_completion<F, T>(mutation: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(mutation).await?
}

#[derive(Clone)]
pub struct RefreshTokenStore {
    store: Arc<dyn IdentityStore>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl RefreshTokenStore {
    pub fn new(store: Arc<dyn IdentityStore>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { store, ttl, clock }
    }

    fn next_record(&self) -> (String, RefreshTokenRecord) {
        let token = generate_refresh_token();
        let record = RefreshTokenRecord {
            digest: hash_token(&token),
            expires_at: self.clock.now() + self.ttl,
        };
        (token, record)
    }

    /// Issue a refresh token for `identity_id`, replacing any previous one
    ///
    /// # Errors
    /// - `UserNotFound` if the identity does not exist
    /// - Store failures
    pub async fn issue(&self, identity_id: Uuid) -> Result<String, AppError> {
        let (token, record) = self.next_record();

        let store = self.store.clone();
        let bound =
            run_to_completion(async move { store.set_refresh_token(identity_id, Some(record)).await })
                .await?;

        if !bound {
            return Err(AppError::Auth(AuthError::UserNotFound));
        }

        tracing::debug!(user_id = %identity_id, "Refresh token issued");
        Ok(token)
    }

    /// Validate a presented refresh token and rotate it
    ///
    /// # Errors
    /// - `MissingToken` for empty input
    /// - `InvalidRefreshToken` for unknown, superseded or structurally impossible tokens,
    ///   and for the losers of a concurrent rotation
    /// - `ExpiredRefreshToken` when the token matched but is past expiry; the slot is cleared
    pub async fn validate_and_rotate(&self, raw: &str) -> Result<RotatedRefreshToken, AppError> {
        if raw.is_empty() {
            return Err(AppError::Auth(AuthError::MissingToken));
        }
        if raw.len() != REFRESH_TOKEN_LENGTH || !raw.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(AppError::Auth(AuthError::InvalidRefreshToken));
        }

        let presented = hash_token(raw);

        let identity = match self.store.find_by_refresh_token(&presented).await? {
            Some(identity) => identity,
            None => {
                tracing::warn!("Refresh token not found");
                return Err(AppError::Auth(AuthError::InvalidRefreshToken));
            }
        };
        let identity_id = identity.id;

        let expired = identity
            .refresh_token
            .as_ref()
            .map_or(true, |record| self.clock.now() >= record.expires_at);

        if expired {
            let store = self.store.clone();
            let expected = presented.clone();
            run_to_completion(async move {
                store.swap_refresh_token(identity_id, &expected, None).await
            })
            .await?;

            tracing::info!(user_id = %identity_id, "Refresh token expired");
            return Err(AppError::Auth(AuthError::ExpiredRefreshToken));
        }

        let (token, record) = self.next_record();
        let store = self.store.clone();
        let rotated = run_to_completion(async move {
            store
                .swap_refresh_token(identity_id, &presented, Some(record))
                .await
        })
        .await?;

        if !rotated {
            tracing::warn!(user_id = %identity_id, "Refresh token superseded during rotation");
            return Err(AppError::Auth(AuthError::InvalidRefreshToken));
        }

        Ok(RotatedRefreshToken {
            identity_id,
            refresh_token: token,
        })
    }

    /// Clear the refresh slot. Idempotent; a missing identity is not an error.
    pub async fn revoke(&self, identity_id: Uuid) -> Result<(), AppError> {
        let store = self.store.clone();
        run_to_completion(async move { store.set_refresh_token(identity_id, None).await })
            .await?;

        tracing::info!(user_id = %identity_id, "Refresh token revoked");
        Ok(())
    }
}
