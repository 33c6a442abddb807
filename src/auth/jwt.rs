/// Access Token Codec
///
/// Mints and verifies HS256-signed access tokens. Verification is stateless:
/// signature first, then expiry against the injected clock with no leeway.

use chrono::Duration;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::claims::Claims;
use crate::auth::clock::Clock;
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};
use crate::identity::Role;

#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    clock: Arc<dyn Clock>,
}

impl TokenCodec {
    pub fn new(config: &JwtSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            issuer: config.issuer.clone(),
            clock,
        }
    }

    /// Mint a signed access token for `subject_id` valid for `ttl`
    ///
    /// # Errors
    /// Returns error if signing fails
    pub fn issue(&self, subject_id: Uuid, role: Role, ttl: Duration) -> Result<String, AppError> {
        let claims = Claims::new(subject_id, role, self.clock.now(), ttl, self.issuer.clone());

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }

    /// Validate a token and return its claims
    ///
    /// # Errors
    /// - `MalformedToken` when the token cannot be parsed
    /// - `InvalidSignature` when it was not signed by us (or names another issuer)
    /// - `TokenExpired` when `now >= exp`
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation())
            .map(|data| data.claims)
            .map_err(|e| {
                let kind = match e.kind() {
                    ErrorKind::InvalidSignature | ErrorKind::InvalidIssuer => {
                        AuthError::InvalidSignature
                    }
                    ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                    _ => AuthError::MalformedToken,
                };
                tracing::debug!(error = %e, code = kind.code(), "Access token rejected");
                kind
            })?;

        claims.subject_id()?;

        if claims.is_expired_at(self.clock.now()) {
            return Err(AuthError::TokenExpired);
        }

        Ok(claims)
    }

    // Expiry is checked against our own clock with millisecond precision.
    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);
        validation.set_issuer(&[&self.issuer]);
        validation
    }
}
