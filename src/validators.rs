/// Input validators for registration and login payloads
/// Features:
/// 1. DoS Protection: Input length limits
/// 2. Email normalisation: trimmed and lower-cased before lookup
/// 3. Name sanitisation: no control characters

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ValidationError;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321
const MIN_EMAIL_LENGTH: usize = 5;
const MAX_NAME_LENGTH: usize = 100;
const MIN_NAME_LENGTH: usize = 3;

lazy_static! {
    // RFC 5322 simplified email regex (practical validation)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$"
    ).expect("email regex is valid");
}

/// Validates and normalises an email address
/// - Checks length constraints
/// - Checks format using RFC 5322 simplified regex
/// - Returns the trimmed, lower-cased form used as the login handle
pub fn is_valid_email(email: &str) -> Result<String, ValidationError> {
    let trimmed = email.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("email".to_string()));
    }

    let length = trimmed.chars().count();
    if length < MIN_EMAIL_LENGTH {
        return Err(ValidationError::TooShort("email".to_string(), MIN_EMAIL_LENGTH));
    }

    if length > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong("email".to_string(), MAX_EMAIL_LENGTH));
    }

    if !EMAIL_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidFormat("email".to_string()));
    }

    // Local part over 64 octets is not deliverable
    if let Some(at_pos) = trimmed.find('@') {
        if at_pos > 64 {
            return Err(ValidationError::SuspiciousContent("email".to_string()));
        }
    }

    Ok(trimmed.to_lowercase())
}

/// Validates a display name
/// - Checks length constraints
/// - Rejects control characters
pub fn is_valid_name(name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("name".to_string()));
    }

    let length = trimmed.chars().count();
    if length < MIN_NAME_LENGTH {
        return Err(ValidationError::TooShort("name".to_string(), MIN_NAME_LENGTH));
    }

    if length > MAX_NAME_LENGTH {
        return Err(ValidationError::TooLong("name".to_string(), MAX_NAME_LENGTH));
    }

    if trimmed.chars().any(|c| c.is_control()) {
        return Err(ValidationError::SuspiciousContent("name".to_string()));
    }

    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_email() {
        assert!(is_valid_email("user@example.com").is_ok());
        assert!(is_valid_email("test.email@domain.co.uk").is_ok());
        assert!(is_valid_email("user+tag@example.com").is_ok());
    }

    #[test]
    fn test_email_is_normalised() {
        assert_eq!(
            is_valid_email("  Alice@Example.COM ").unwrap(),
            "alice@example.com"
        );
    }

    #[test]
    fn test_invalid_email_format() {
        assert!(is_valid_email("invalid").is_err());
        assert!(is_valid_email("user@").is_err());
        assert!(is_valid_email("@example.com").is_err());
        assert!(is_valid_email("user@@example.com").is_err());
    }

    #[test]
    fn test_email_length_limits() {
        let too_long = format!("{}@example.com", "a".repeat(250));
        assert!(matches!(
            is_valid_email(&too_long),
            Err(ValidationError::TooLong(_, 254))
        ));

        assert!(matches!(
            is_valid_email("a@b"),
            Err(ValidationError::TooShort(_, 5))
        ));
        assert!(matches!(is_valid_email("   "), Err(ValidationError::EmptyField(_))));
    }

    #[test]
    fn test_oversized_local_part() {
        let email = format!("{}@example.com", "a".repeat(65));
        assert!(matches!(
            is_valid_email(&email),
            Err(ValidationError::SuspiciousContent(_))
        ));
    }

    #[test]
    fn test_valid_name() {
        assert!(is_valid_name("John Doe").is_ok());
        assert!(is_valid_name("Jean-Pierre").is_ok());
        assert!(is_valid_name("O'Brien").is_ok());
        assert_eq!(is_valid_name("  alice  ").unwrap(), "alice");
    }

    #[test]
    fn test_name_length_limits() {
        assert!(is_valid_name("").is_err());
        assert!(matches!(is_valid_name("ab"), Err(ValidationError::TooShort(_, 3))));
        assert!(is_valid_name("abc").is_ok());
        assert!(is_valid_name(&"a".repeat(100)).is_ok());
        assert!(matches!(
            is_valid_name(&"a".repeat(101)),
            Err(ValidationError::TooLong(_, 100))
        ));
    }

    #[test]
    fn test_control_characters() {
        assert!(is_valid_name("Name\0with\0null").is_err());
        assert!(is_valid_name("tab\tname").is_err());
    }
}
