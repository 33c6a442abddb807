/// Error Handling Module
///
/// Every failure in the service maps to one closed enum, rendered at the HTTP
/// boundary with a stable machine-readable code:
/// 1. Domain-specific error types (validation, storage, auth, config)
/// 2. Unified `AppError` used for control flow
/// 3. HTTP response mapping with structured logging
/// 4. Error context enrichment

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use std::error::Error as StdError;
use std::fmt;

/// ============================================================================
/// 1. DOMAIN-SPECIFIC ERROR TYPES
/// ============================================================================

/// Validation errors for input data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyField(String),
    TooShort(String, usize),
    TooLong(String, usize),
    InvalidFormat(String),
    SuspiciousContent(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyField(field) => write!(f, "{} is empty", field),
            ValidationError::TooShort(field, min) => {
                write!(f, "{} is too short (minimum {} characters)", field, min)
            }
            ValidationError::TooLong(field, max) => {
                write!(f, "{} is too long (maximum {} characters)", field, max)
            }
            ValidationError::InvalidFormat(field) => write!(f, "{} has invalid format", field),
            ValidationError::SuspiciousContent(field) => {
                write!(f, "{} contains suspicious content", field)
            }
        }
    }
}

impl StdError for ValidationError {}

/// Identity store errors
#[derive(Debug)]
pub enum DatabaseError {
    UniqueConstraintViolation(String),
    NotFound(String),
    QueryExecution(String),
    ConnectionPool(String),
    UnexpectedError(String),
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseError::UniqueConstraintViolation(msg) => {
                write!(f, "Duplicate entry: {}", msg)
            }
            DatabaseError::NotFound(msg) => write!(f, "Not found: {}", msg),
            DatabaseError::QueryExecution(msg) => write!(f, "Query error: {}", msg),
            DatabaseError::ConnectionPool(msg) => write!(f, "Database connection error: {}", msg),
            DatabaseError::UnexpectedError(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl StdError for DatabaseError {}

/// Configuration errors
#[derive(Debug)]
pub enum ConfigError {
    MissingRequired(String),
    InvalidValue(String),
    ParseError(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingRequired(msg) => write!(f, "Missing required config: {}", msg),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid config value: {}", msg),
            ConfigError::ParseError(msg) => write!(f, "Config parse error: {}", msg),
        }
    }
}

impl StdError for ConfigError {}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

/// Authentication and authorization errors
///
/// Internal variants are finer grained than the codes clients see:
/// `IdentityNotFound` and `InvalidCredential` render identically so that a
/// login response never reveals whether the email exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// No bearer token (or refresh token) was presented
    MissingToken,
    /// Token could not be parsed
    MalformedToken,
    /// Token parsed but was not signed by us
    InvalidSignature,
    /// Access token is past its expiry
    TokenExpired,
    /// Refresh token is unknown, rotated away, revoked, or lost a rotation race
    InvalidRefreshToken,
    /// Refresh token matched but is past its expiry
    ExpiredRefreshToken,
    /// Login handle is not registered
    IdentityNotFound,
    /// Login secret did not match
    InvalidCredential,
    /// Token subject no longer resolves to an identity
    UserNotFound,
    /// Authenticated, but the role is not allowed here
    UnauthorizedAccess,
}

impl AuthError {
    /// Stable error code surfaced to clients
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "AUTH_TOKEN_NOT_FOUND",
            AuthError::MalformedToken
            | AuthError::InvalidSignature
            | AuthError::InvalidRefreshToken => "AUTH_INVALID_TOKEN",
            AuthError::TokenExpired | AuthError::ExpiredRefreshToken => "AUTH_TOKEN_EXPIRED",
            AuthError::IdentityNotFound | AuthError::InvalidCredential => {
                "AUTH_INVALID_CREDENTIAL"
            }
            AuthError::UserNotFound => "AUTH_USER_NOT_FOUND",
            AuthError::UnauthorizedAccess => "AUTH_UNAUTHORIZED_ACCESS",
        }
    }

    /// Client-facing message; identical for every variant sharing a code
    pub fn public_message(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "No authorization token provided. Use: Bearer <token>",
            AuthError::MalformedToken
            | AuthError::InvalidSignature
            | AuthError::InvalidRefreshToken => "Invalid token",
            AuthError::TokenExpired | AuthError::ExpiredRefreshToken => "Token has expired",
            AuthError::IdentityNotFound | AuthError::InvalidCredential => {
                "Invalid email or password"
            }
            AuthError::UserNotFound => "User not found",
            AuthError::UnauthorizedAccess => "You do not have permission to access this resource",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::UnauthorizedAccess => StatusCode::FORBIDDEN,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::MissingToken => write!(f, "Missing authentication token"),
            AuthError::MalformedToken => write!(f, "Malformed token"),
            AuthError::InvalidSignature => write!(f, "Invalid token signature"),
            AuthError::TokenExpired => write!(f, "Token has expired"),
            AuthError::InvalidRefreshToken => write!(f, "Invalid refresh token"),
            AuthError::ExpiredRefreshToken => write!(f, "Refresh token has expired"),
            AuthError::IdentityNotFound => write!(f, "No identity registered for handle"),
            AuthError::InvalidCredential => write!(f, "Credential mismatch"),
            AuthError::UserNotFound => write!(f, "Token subject not found"),
            AuthError::UnauthorizedAccess => write!(f, "Role not permitted"),
        }
    }
}

impl StdError for AuthError {}

/// ============================================================================
/// 2. UNIFIED APPLICATION ERROR TYPE
/// ============================================================================

/// Central error type that all application errors map to
#[derive(Debug)]
pub enum AppError {
    Validation(ValidationError),
    Database(DatabaseError),
    Auth(AuthError),
    Config(ConfigError),
    Internal(String),
}

impl AppError {
    /// Only collaborator failures are worth retrying; everything else needs
    /// different input or a fresh login.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::Database(
                DatabaseError::ConnectionPool(_)
                    | DatabaseError::QueryExecution(_)
                    | DatabaseError::UnexpectedError(_)
            )
        )
    }

    /// The auth error kind, if this is one
    pub fn auth_kind(&self) -> Option<AuthError> {
        match self {
            AppError::Auth(e) => Some(*e),
            _ => None,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(e) => write!(f, "{}", e),
            AppError::Database(e) => write!(f, "{}", e),
            AppError::Auth(e) => write!(f, "{}", e),
            AppError::Config(e) => write!(f, "{}", e),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl StdError for AppError {}

// ============================================================================
// FROM IMPLEMENTATIONS
// ============================================================================

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        AppError::Database(err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

/// SQLSTATE for unique_violation
const PG_UNIQUE_VIOLATION: &str = "23505";

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        let db_err = match &err {
            sqlx::Error::Database(e) if e.code().as_deref() == Some(PG_UNIQUE_VIOLATION) => {
                DatabaseError::UniqueConstraintViolation(e.message().to_string())
            }
            sqlx::Error::RowNotFound => DatabaseError::NotFound("Record not found".to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DatabaseError::ConnectionPool(err.to_string())
            }
            sqlx::Error::Database(_) | sqlx::Error::ColumnDecode { .. } => {
                DatabaseError::QueryExecution(err.to_string())
            }
            _ => DatabaseError::UnexpectedError(err.to_string()),
        };
        AppError::Database(db_err)
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("Background task failed: {}", err))
    }
}

// ============================================================================
// 3. HTTP RESPONSE MAPPING
// ============================================================================

/// Error response body. Shape is identical for every error.
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Human-readable error message
    pub message: String,
    /// Stable error code for client-side handling
    pub code: String,
    /// HTTP status code
    pub status: u16,
    /// Whether retrying the same request may succeed
    pub retryable: bool,
    /// Timestamp when error occurred
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_id: String, message: String, code: String, status: u16, retryable: bool) -> Self {
        Self {
            error_id,
            message,
            code,
            status,
            retryable,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Trait for converting errors to HTTP responses with proper logging
pub trait ErrorHandler {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse);
    fn log_error(&self, request_id: &str);
}

impl ErrorHandler for AppError {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse) {
        let (status, code, message) = match self {
            AppError::Validation(e) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                e.to_string(),
            ),

            AppError::Database(e) => match e {
                DatabaseError::UniqueConstraintViolation(_) => (
                    StatusCode::CONFLICT,
                    "AUTH_EMAIL_ALREADY_EXISTS",
                    "User with this email already exists".to_string(),
                ),
                DatabaseError::NotFound(_) => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    "Resource not found".to_string(),
                ),
                DatabaseError::ConnectionPool(_) => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Database service temporarily unavailable".to_string(),
                ),
                DatabaseError::QueryExecution(_) | DatabaseError::UnexpectedError(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "Database error occurred".to_string(),
                ),
            },

            AppError::Auth(e) => (e.status_code(), e.code(), e.public_message().to_string()),

            AppError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CONFIG_ERROR",
                "Server configuration error".to_string(),
            ),

            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal server error".to_string(),
            ),
        };

        let error_response = ErrorResponse::new(
            request_id.to_string(),
            message,
            code.to_string(),
            status.as_u16(),
            self.is_retryable(),
        );

        (status, error_response)
    }

    fn log_error(&self, request_id: &str) {
        match self {
            AppError::Validation(e) => {
                tracing::warn!(request_id = request_id, error = %e, "Validation error");
            }
            AppError::Database(DatabaseError::UniqueConstraintViolation(_)) => {
                tracing::warn!(request_id = request_id, error = %self, "Duplicate entry attempt");
            }
            AppError::Database(e) => {
                tracing::error!(request_id = request_id, error = %e, "Database error");
            }
            AppError::Auth(e) => match e {
                AuthError::IdentityNotFound | AuthError::InvalidCredential => {
                    tracing::warn!(
                        request_id = request_id,
                        error = %e,
                        "Invalid credentials attempt"
                    );
                }
                _ => {
                    tracing::warn!(
                        request_id = request_id,
                        error = %e,
                        code = e.code(),
                        "Authentication error"
                    );
                }
            },
            AppError::Config(e) => {
                tracing::error!(request_id = request_id, error = %e, "Configuration error");
            }
            AppError::Internal(msg) => {
                tracing::error!(request_id = request_id, error = %msg, "Internal error");
            }
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let request_id = uuid::Uuid::new_v4().to_string();
        self.log_error(&request_id);

        let (status, error_response) = <Self as ErrorHandler>::error_response(self, &request_id);

        HttpResponse::build(status).json(error_response)
    }

    fn status_code(&self) -> StatusCode {
        <Self as ErrorHandler>::error_response(self, "").0
    }
}

// ============================================================================
// 4. ERROR CONTEXT ENRICHMENT
// ============================================================================

/// Per-operation context carried into structured logs
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub request_id: String,
    pub user_id: Option<String>,
    pub operation: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            user_id: None,
            operation: operation.into(),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn with_user_id(mut self, user_id: String) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn log_error(&self, error: &AppError) {
        let context = serde_json::json!({
            "request_id": self.request_id,
            "operation": self.operation,
            "user_id": self.user_id,
            "timestamp": self.timestamp.to_rfc3339(),
        });

        match error {
            AppError::Validation(_) | AppError::Auth(_) => {
                tracing::warn!(error = %error, context = ?context, "Request rejected");
            }
            AppError::Database(_) | AppError::Config(_) | AppError::Internal(_) => {
                tracing::error!(error = %error, context = ?context, "Request failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::EmptyField("email".to_string());
        assert_eq!(err.to_string(), "email is empty");
    }

    #[test]
    fn test_app_error_conversion() {
        let app_err: AppError = AuthError::TokenExpired.into();
        assert_eq!(app_err.auth_kind(), Some(AuthError::TokenExpired));
    }

    #[test]
    fn test_login_failures_render_identically() {
        let (status_a, unknown) = ErrorHandler::error_response(&AppError::from(AuthError::IdentityNotFound), "a");
        let (status_b, wrong) = ErrorHandler::error_response(&AppError::from(AuthError::InvalidCredential), "b");

        assert_eq!(status_a, status_b);
        assert_eq!(unknown.code, "AUTH_INVALID_CREDENTIAL");
        assert_eq!(unknown.code, wrong.code);
        assert_eq!(unknown.message, wrong.message);
    }

    #[test]
    fn test_auth_error_codes_are_stable() {
        let cases = [
            (AuthError::MissingToken, "AUTH_TOKEN_NOT_FOUND", 401),
            (AuthError::MalformedToken, "AUTH_INVALID_TOKEN", 401),
            (AuthError::InvalidSignature, "AUTH_INVALID_TOKEN", 401),
            (AuthError::TokenExpired, "AUTH_TOKEN_EXPIRED", 401),
            (AuthError::InvalidRefreshToken, "AUTH_INVALID_TOKEN", 401),
            (AuthError::ExpiredRefreshToken, "AUTH_TOKEN_EXPIRED", 401),
            (AuthError::UserNotFound, "AUTH_USER_NOT_FOUND", 401),
            (AuthError::UnauthorizedAccess, "AUTH_UNAUTHORIZED_ACCESS", 403),
        ];

        for (err, code, status) in cases {
            let (http_status, body) = ErrorHandler::error_response(&AppError::from(err), "req");
            assert_eq!(body.code, code, "code for {:?}", err);
            assert_eq!(http_status.as_u16(), status, "status for {:?}", err);
            assert!(!body.retryable);
        }
    }

    #[test]
    fn test_only_store_failures_are_retryable() {
        assert!(AppError::Database(DatabaseError::ConnectionPool("down".into())).is_retryable());
        assert!(!AppError::Database(DatabaseError::UniqueConstraintViolation("email".into()))
            .is_retryable());
        assert!(!AppError::Auth(AuthError::InvalidRefreshToken).is_retryable());
        assert!(!AppError::Internal("boom".into()).is_retryable());
    }

    #[test]
    fn test_duplicate_entry_maps_to_conflict() {
        let err = AppError::Database(DatabaseError::UniqueConstraintViolation("email".into()));
        let (status, body) = ErrorHandler::error_response(&err, "req");
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.code, "AUTH_EMAIL_ALREADY_EXISTS");
    }

    #[test]
    fn test_error_context_creation() {
        let ctx = ErrorContext::new("test_operation");
        assert_eq!(ctx.operation, "test_operation");
        assert!(ctx.user_id.is_none());

        let ctx_with_user = ctx.with_user_id("user-123".to_string());
        assert_eq!(ctx_with_user.user_id, Some("user-123".to_string()));
    }
}
