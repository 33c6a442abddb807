/// JWT Claims structure
///
/// Payload of an access token. `iat` and `exp` are Unix timestamps in
/// milliseconds so that expiry can be enforced on exact sub-second boundaries.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuthError;
use crate::identity::Role;

/// JWT Claims for access tokens
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (identity ID as UUID string)
    pub sub: String,
    /// Role at the time of issuance
    pub role: Role,
    /// Issued at (Unix milliseconds)
    pub iat: i64,
    /// Expiration time (Unix milliseconds)
    pub exp: i64,
    /// Issuer
    pub iss: String,
}

impl Claims {
    /// Create claims valid for `ttl` starting at `now`
    pub fn new(
        subject_id: Uuid,
        role: Role,
        now: DateTime<Utc>,
        ttl: Duration,
        issuer: String,
    ) -> Self {
        let iat = now.timestamp_millis();
        Self {
            sub: subject_id.to_string(),
            role,
            iat,
            exp: iat + ttl.num_milliseconds(),
            iss: issuer,
        }
    }

    /// Extract the subject identity ID
    ///
    /// # Errors
    /// Returns `MalformedToken` if the subject is not a valid UUID
    pub fn subject_id(&self) -> Result<Uuid, AuthError> {
        Uuid::parse_str(&self.sub).map_err(|_| AuthError::MalformedToken)
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.iat).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.exp).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Expiry is exclusive: a token is dead at exactly `exp`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp_millis() >= self.exp
    }
}
