use actix_web::{web, HttpResponse};
use uuid::Uuid;

use crate::auth::AuthenticatedIdentity;
use crate::error::{AppError, DatabaseError, ErrorContext};
use crate::identity::IdentityStore;
use crate::routes::auth::UserResponse;

/// GET /users/me
///
/// **Requires valid JWT access token**, injected by the JWT middleware.
pub async fn get_current_user(identity: web::ReqData<AuthenticatedIdentity>) -> HttpResponse {
    HttpResponse::Ok().json(UserResponse::from(&*identity))
}

/// GET /admin/users/{id}
///
/// ADMIN only; the role gate runs before this handler.
///
/// # Errors
/// - 404: No identity with this id
pub async fn get_user(
    path: web::Path<Uuid>,
    caller: web::ReqData<AuthenticatedIdentity>,
    store: web::Data<dyn IdentityStore>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("admin_get_user").with_user_id(caller.id.to_string());
    let user_id = path.into_inner();

    let identity = store
        .find_by_id(user_id)
        .await
        .map_err(|e| {
            context.log_error(&e);
            e
        })?
        .ok_or_else(|| AppError::Database(DatabaseError::NotFound(format!("user {}", user_id))))?;

    Ok(HttpResponse::Ok().json(UserResponse::from(&identity)))
}
