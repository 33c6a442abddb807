/// Session Manager
///
/// Orchestrates credential checks, access-token minting and refresh-token
/// rotation into the register / login / refresh / logout operations.
///
/// Per identity: Anonymous -> (login) -> Authenticated -> (refresh) ->
/// Authenticated with a new pair -> (logout | failed refresh) -> Anonymous.
/// Logout does not revoke outstanding access tokens; they live until expiry.

use chrono::Duration;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::clock::Clock;
use crate::auth::jwt::TokenCodec;
use crate::auth::password::CredentialHasher;
use crate::auth::refresh_token::RefreshTokenStore;
use crate::configuration::{CredentialSettings, JwtSettings};
use crate::error::{AppError, AuthError};
use crate::identity::{Identity, IdentityStore, Role};

/// Hashed once at startup and verified against when the login handle is
/// unknown, so both failure paths pay the same bcrypt cost.
const DUMMY_SECRET: &str = "dummy-secret-for-unknown-handles";

/// Access/refresh pair handed to the client
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub identity: Identity,
    pub tokens: TokenPair,
}

/// Registration input, already validated
#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub email: String,
    pub name: String,
    pub password: String,
    pub role: Role,
}

pub struct SessionManager {
    store: Arc<dyn IdentityStore>,
    codec: TokenCodec,
    refresh_tokens: RefreshTokenStore,
    hasher: CredentialHasher,
    access_token_ttl: Duration,
    dummy_hash: String,
}

impl SessionManager {
    /// # Errors
    /// Returns error if the bcrypt cost is unusable
    pub async fn new(
        store: Arc<dyn IdentityStore>,
        jwt: &JwtSettings,
        credentials: &CredentialSettings,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AppError> {
        let hasher = CredentialHasher::new(credentials.hash_cost);
        let dummy_hash = hasher.hash(DUMMY_SECRET).await?;

        Ok(Self {
            codec: TokenCodec::new(jwt, clock.clone()),
            refresh_tokens: RefreshTokenStore::new(
                store.clone(),
                Duration::seconds(jwt.refresh_token_expiry),
                clock,
            ),
            store,
            hasher,
            access_token_ttl: Duration::seconds(jwt.access_token_expiry),
            dummy_hash,
        })
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Create a new identity with a hashed secret
    ///
    /// # Errors
    /// - Validation error if the secret fails the length policy
    /// - Unique violation if the email is taken
    pub async fn register(&self, new_identity: NewIdentity) -> Result<Identity, AppError> {
        let NewIdentity {
            email,
            name,
            password,
            role,
        } = new_identity;

        let password_hash = self.hasher.hash(&password).await?;
        let identity = Identity::new(email, name, password_hash, role);

        self.store.insert(&identity).await?;

        tracing::info!(user_id = %identity.id, role = %identity.role, "Identity registered");
        Ok(identity)
    }

    /// Authenticate with email + secret and open a session
    ///
    /// # Errors
    /// - `IdentityNotFound` / `InvalidCredential` (rendered identically to clients)
    /// - Store or hashing failures
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, AppError> {
        let identity = match self.store.find_by_email(email).await? {
            Some(identity) => identity,
            None => {
                self.hasher.verify(password, &self.dummy_hash).await?;
                return Err(AppError::Auth(AuthError::IdentityNotFound));
            }
        };

        if !self.hasher.verify(password, &identity.password_hash).await? {
            return Err(AppError::Auth(AuthError::InvalidCredential));
        }

        let access_token = self
            .codec
            .issue(identity.id, identity.role, self.access_token_ttl)?;
        let refresh_token = self.refresh_tokens.issue(identity.id).await?;

        tracing::info!(user_id = %identity.id, "Session opened");

        Ok(LoginOutcome {
            identity,
            tokens: TokenPair {
                access_token,
                refresh_token,
                expires_in: self.access_token_ttl.num_seconds(),
            },
        })
    }

    /// Exchange a refresh token for a new pair
    ///
    /// Errors from the refresh token store propagate unchanged; any failure
    /// means the client must log in again.
    pub async fn refresh(&self, raw_refresh_token: &str) -> Result<TokenPair, AppError> {
        let rotated = self
            .refresh_tokens
            .validate_and_rotate(raw_refresh_token)
            .await?;

        let identity = self
            .store
            .find_by_id(rotated.identity_id)
            .await?
            .ok_or(AppError::Auth(AuthError::UserNotFound))?;

        let access_token = self
            .codec
            .issue(identity.id, identity.role, self.access_token_ttl)?;

        tracing::info!(user_id = %identity.id, "Session refreshed");

        Ok(TokenPair {
            access_token,
            refresh_token: rotated.refresh_token,
            expires_in: self.access_token_ttl.num_seconds(),
        })
    }

    /// Close the session. Best-effort: failures are logged, never surfaced.
    pub async fn logout(&self, identity_id: Uuid) {
        if let Err(e) = self.refresh_tokens.revoke(identity_id).await {
            tracing::warn!(user_id = %identity_id, error = %e, "Failed to revoke refresh token");
        }
    }
}
