/// Authentication Routes
///
/// Handles registration, login, token refresh and logout.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{
    validate_password_strength, AuthenticatedIdentity, NewIdentity, SessionManager, TokenPair,
};
use crate::error::{AppError, ErrorContext};
use crate::identity::{Identity, Role};
use crate::validators::{is_valid_email, is_valid_name};

/// User registration request
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

/// User login request
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Token refresh request
#[derive(Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Public view of an identity; never carries digests
#[derive(Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub created_at: String,
}

impl From<&Identity> for UserResponse {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id.to_string(),
            email: identity.email.clone(),
            name: identity.name.clone(),
            role: identity.role,
            created_at: identity.created_at.to_rfc3339(),
        }
    }
}

impl From<&AuthenticatedIdentity> for UserResponse {
    fn from(identity: &AuthenticatedIdentity) -> Self {
        Self {
            id: identity.id.to_string(),
            email: identity.email.clone(),
            name: identity.name.clone(),
            role: identity.role,
            created_at: identity.created_at.to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub user: UserResponse,
}

/// Access and refresh tokens
#[derive(Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl From<TokenPair> for AuthResponse {
    fn from(tokens: TokenPair) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: tokens.expires_in,
        }
    }
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub user: UserResponse,
    #[serde(flatten)]
    pub tokens: AuthResponse,
}

/// POST /auth/register
///
/// Register a new user. Always creates the USER role and does not log in.
///
/// # Errors
/// - 400: Validation errors (invalid email/password/name)
/// - 409: Email already registered
pub async fn register(
    form: web::Json<RegisterRequest>,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_registration");
    let form = form.into_inner();

    let email = is_valid_email(&form.email)?;
    let name = is_valid_name(&form.name)?;
    validate_password_strength(&form.password)?;

    let identity = sessions
        .register(NewIdentity {
            email,
            name,
            password: form.password,
            role: Role::User,
        })
        .await
        .map_err(|e| {
            context.log_error(&e);
            e
        })?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %identity.id,
        "User registered successfully"
    );

    Ok(HttpResponse::Created().json(RegisterResponse {
        user: UserResponse::from(&identity),
    }))
}

/// POST /auth/login
///
/// Authenticate with email and password; returns the user and a token pair.
/// Unknown email and wrong password produce the same response.
///
/// # Errors
/// - 400: Validation error (invalid email format)
/// - 401: AUTH_INVALID_CREDENTIAL
pub async fn login(
    form: web::Json<LoginRequest>,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_login");

    let email = is_valid_email(&form.email)?;

    let outcome = sessions
        .login(&email, &form.password)
        .await
        .map_err(|e| {
            context.log_error(&e);
            e
        })?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = %outcome.identity.id,
        "User logged in successfully"
    );

    Ok(HttpResponse::Ok().json(LoginResponse {
        user: UserResponse::from(&outcome.identity),
        tokens: AuthResponse::from(outcome.tokens),
    }))
}

/// POST /auth/refresh
///
/// Exchange a refresh token for a new pair. The presented token is rotated
/// away; replaying it fails.
///
/// # Errors
/// - 401: AUTH_TOKEN_NOT_FOUND, AUTH_INVALID_TOKEN, AUTH_TOKEN_EXPIRED
pub async fn refresh(
    form: web::Json<RefreshRequest>,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("token_refresh");
    let raw = form.into_inner().refresh_token.unwrap_or_default();

    let tokens = sessions.refresh(raw.trim()).await.map_err(|e| {
        context.log_error(&e);
        e
    })?;

    tracing::info!(request_id = %context.request_id, "Token refreshed successfully");

    Ok(HttpResponse::Ok().json(AuthResponse::from(tokens)))
}

/// POST /auth/logout
///
/// Revoke the caller's refresh token. Requires a valid access token; the
/// access token itself stays valid until it expires.
pub async fn logout(
    identity: web::ReqData<AuthenticatedIdentity>,
    sessions: web::Data<SessionManager>,
) -> HttpResponse {
    sessions.logout(identity.id).await;

    tracing::info!(user_id = %identity.id, "User logged out");

    HttpResponse::NoContent().finish()
}
