use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::{AccessGuard, Clock, SessionManager};
use crate::configuration::{CredentialSettings, JwtSettings};
use crate::error::{AppError, ValidationError};
use crate::identity::IdentityStore;
use crate::logger::LoggerMiddleware;
use crate::middleware::{JwtMiddleware, RoleGuard};
use crate::routes::{
    get_current_user, get_user, health_check, login, logout, refresh, register,
};

/// Everything the HTTP layer shares across workers
#[derive(Clone)]
pub struct Services {
    pub sessions: Arc<SessionManager>,
    pub guard: AccessGuard,
    pub store: Arc<dyn IdentityStore>,
}

impl Services {
    /// Wire the session manager and access guard over one store and clock
    ///
    /// # Errors
    /// Returns error if the credential hasher cannot be initialised
    pub async fn build(
        store: Arc<dyn IdentityStore>,
        jwt: &JwtSettings,
        credentials: &CredentialSettings,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AppError> {
        let sessions = SessionManager::new(store.clone(), jwt, credentials, clock).await?;
        let guard = AccessGuard::new(sessions.codec().clone(), store.clone());

        Ok(Self {
            sessions: Arc::new(sessions),
            guard,
            store,
        })
    }
}

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        tracing::warn!(error = %err, "Rejected request payload");
        AppError::Validation(ValidationError::InvalidFormat("request body".to_string())).into()
    })
}

fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err, _req| {
        tracing::warn!(error = %err, "Rejected path parameter");
        AppError::Validation(ValidationError::InvalidFormat("path parameter".to_string())).into()
    })
}

pub fn run(listener: TcpListener, services: Services) -> Result<Server, std::io::Error> {
    let sessions = web::Data::from(services.sessions);
    let store: web::Data<dyn IdentityStore> = web::Data::from(services.store);
    let guard = services.guard;

    let server = HttpServer::new(move || {
        App::new()
            // Access log (query values are redacted there)
            .wrap(LoggerMiddleware)

            // Shared state
            .app_data(json_config())
            .app_data(path_config())
            .app_data(sessions.clone())
            .app_data(store.clone())

            // Public routes (no authentication required)
            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/auth")
                    .route("/register", web::post().to(register))
                    .route("/login", web::post().to(login))
                    .route("/refresh", web::post().to(refresh))
                    .service(
                        web::resource("/logout")
                            .wrap(JwtMiddleware::new(guard.clone()))
                            .route(web::post().to(logout)),
                    ),
            )

            // Protected routes (require JWT authentication)
            .service(
                web::scope("/users")
                    .wrap(JwtMiddleware::new(guard.clone()).allow_query_token())
                    .route("/me", web::get().to(get_current_user)),
            )
            .service(
                web::scope("/admin")
                    .wrap(RoleGuard::admin_only())
                    .wrap(JwtMiddleware::new(guard.clone()))
                    .route("/users/{id}", web::get().to(get_user)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
