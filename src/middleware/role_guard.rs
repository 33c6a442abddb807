/// Role gate
///
/// Runs behind `JwtMiddleware` and admits only identities whose role is in the
/// allowed set.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;

use crate::auth::AuthenticatedIdentity;
use crate::error::{AppError, AuthError};
use crate::identity::Role;

pub struct RoleGuard {
    allowed: Rc<Vec<Role>>,
}

impl RoleGuard {
    pub fn new(allowed: impl IntoIterator<Item = Role>) -> Self {
        Self {
            allowed: Rc::new(allowed.into_iter().collect()),
        }
    }

    pub fn admin_only() -> Self {
        Self::new([Role::Admin])
    }
}

fn check_role(identity: Option<&AuthenticatedIdentity>, allowed: &[Role]) -> Result<(), AuthError> {
    match identity {
        None => Err(AuthError::MissingToken),
        Some(identity) if allowed.contains(&identity.role) => Ok(()),
        Some(_) => Err(AuthError::UnauthorizedAccess),
    }
}

impl<S, B> Transform<S, ServiceRequest> for RoleGuard
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RoleGuardService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(RoleGuardService {
            service: Rc::new(service),
            allowed: self.allowed.clone(),
        }))
    }
}

pub struct RoleGuardService<S> {
    service: Rc<S>,
    allowed: Rc<Vec<Role>>,
}

impl<S, B> Service<ServiceRequest> for RoleGuardService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let decision = {
            let extensions = req.extensions();
            let identity = extensions.get::<AuthenticatedIdentity>();
            if let Some(identity) = identity {
                if !self.allowed.contains(&identity.role) {
                    tracing::warn!(
                        user_id = %identity.id,
                        role = %identity.role,
                        path = %req.path(),
                        "Role not permitted"
                    );
                }
            }
            check_role(identity, &self.allowed)
        };

        match decision {
            Ok(()) => {
                let service = self.service.clone();
                Box::pin(async move { service.call(req).await })
            }
            Err(e) => Box::pin(async move { Err(AppError::Auth(e).into()) }),
        }
    }
}
