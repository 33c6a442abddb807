/// Credential Hashing and Verification
///
/// Secrets are stored as bcrypt digests (salted, adaptive cost). bcrypt only
/// reads the first 72 bytes of its input, so every secret is first reduced to
/// its SHA-256 hex digest (64 bytes) and that is what bcrypt sees. bcrypt compares
/// digests in constant time, so `verify` leaks nothing about where a mismatch
/// occurs. Both operations are CPU-bound; async callers go through
/// `CredentialHasher`, which moves the work onto tokio's blocking pool.

use bcrypt::{hash, verify};
use sha2::{Digest, Sha256};

use crate::error::{AppError, ValidationError};

pub const MIN_PASSWORD_LENGTH: usize = 6;
pub const MAX_PASSWORD_LENGTH: usize = 100;

fn prehash(password: &str) -> String {
    format!("{:x}", Sha256::digest(password.as_bytes()))
}

/// Hash a secret with bcrypt at the given cost
///
/// # Errors
/// Returns error if:
/// - Secret fails the length policy
/// - Cost is out of bcrypt's range
pub fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    validate_password_strength(password)?;

    hash(prehash(password), cost)
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a secret against its stored digest
///
/// Returns `Ok(false)` for a well-formed digest that does not match.
///
/// # Errors
/// Returns error only if the stored digest is malformed
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    verify(prehash(password), hash)
        .map_err(|e| AppError::Internal(format!("Stored password digest is invalid: {}", e)))
}

/// Length policy for secrets: 6 to 100 characters
pub fn validate_password_strength(password: &str) -> Result<(), AppError> {
    let length = password.chars().count();

    if length < MIN_PASSWORD_LENGTH {
        return Err(AppError::Validation(ValidationError::TooShort(
            "password".to_string(),
            MIN_PASSWORD_LENGTH,
        )));
    }

    if length > MAX_PASSWORD_LENGTH {
        return Err(AppError::Validation(ValidationError::TooLong(
            "password".to_string(),
            MAX_PASSWORD_LENGTH,
        )));
    }

    Ok(())
}

/// Async front for the Credential Verifier
#[derive(Debug, Clone, Copy)]
pub struct CredentialHasher {
    cost: u32,
}

impl CredentialHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub async fn hash(&self, password: &str) -> Result<String, AppError> {
        let password = password.to_string();
        let cost = self.cost;
        tokio::task::spawn_blocking(move || hash_password(&password, cost)).await?
    }

    pub async fn verify(&self, password: &str, hash: &str) -> Result<bool, AppError> {
        let password = password.to_string();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || verify_password(&password, &hash)).await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_COST: u32 = 4;

    #[test]
    fn test_hash_password() {
        let password = "s3cret!";
        let hash = hash_password(password, TEST_COST).expect("Failed to hash password");

        assert_ne!(password, hash);
        assert!(hash.starts_with("$2"));
    }

    #[test]
    fn test_hashes_are_salted() {
        let first = hash_password("s3cret!", TEST_COST).unwrap();
        let second = hash_password("s3cret!", TEST_COST).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_verify_password() {
        let hash = hash_password("s3cret!", TEST_COST).unwrap();
        assert!(verify_password("s3cret!", &hash).expect("Failed to verify password"));
    }

    #[test]
    fn test_verify_wrong_password() {
        let hash = hash_password("s3cret!", TEST_COST).unwrap();
        assert!(!verify_password("s3cret?", &hash).expect("Wrong secret must not error"));
    }

    #[test]
    fn test_secrets_sharing_a_72_byte_prefix_differ() {
        let prefix = "a".repeat(72);
        let hash = hash_password(&format!("{}REAL-SUFFIX", prefix), TEST_COST).unwrap();

        assert!(verify_password(&format!("{}REAL-SUFFIX", prefix), &hash).unwrap());
        assert!(!verify_password(&format!("{}totally-different", prefix), &hash).unwrap());
        assert!(!verify_password(&prefix, &hash).unwrap());
    }

    #[test]
    fn test_multibyte_secret_at_max_length() {
        // 100 characters, 200 bytes
        let password = "é".repeat(MAX_PASSWORD_LENGTH);
        let hash = hash_password(&password, TEST_COST).unwrap();

        assert!(verify_password(&password, &hash).unwrap());
        assert!(!verify_password(&"é".repeat(MAX_PASSWORD_LENGTH - 1), &hash).unwrap());
    }

    #[test]
    fn test_verify_malformed_digest_is_internal_error() {
        let result = verify_password("s3cret!", "not-a-bcrypt-digest");
        assert!(matches!(result, Err(AppError::Internal(_))));
    }

    #[test]
    fn test_too_short_password() {
        assert!(matches!(
            hash_password("abc12", TEST_COST),
            Err(AppError::Validation(ValidationError::TooShort(_, 6)))
        ));
    }

    #[test]
    fn test_too_long_password() {
        let long_password = "a".repeat(MAX_PASSWORD_LENGTH + 1);
        assert!(matches!(
            hash_password(&long_password, TEST_COST),
            Err(AppError::Validation(ValidationError::TooLong(_, 100)))
        ));
    }

    #[tokio::test]
    async fn test_hasher_runs_off_the_async_worker() {
        let hasher = CredentialHasher::new(TEST_COST);
        let hash = hasher.hash("s3cret!").await.unwrap();

        assert!(hasher.verify("s3cret!", &hash).await.unwrap());
        assert!(!hasher.verify("nope-nope", &hash).await.unwrap());
    }
}
