/// JWT Authentication Middleware
///
/// Validates bearer access tokens through the `AccessGuard` and injects the
/// resolved `AuthenticatedIdentity` into request extensions for use by route
/// handlers.

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::{header, Method},
    web, Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::collections::HashMap;
use std::rc::Rc;

use crate::auth::AccessGuard;
use crate::error::{AppError, AuthError};

const BEARER_PREFIX: &str = "Bearer ";
const QUERY_TOKEN_PARAM: &str = "token";

/// JWT middleware for protecting routes
///
/// Must be applied to routes that require authentication.
/// Reads `Authorization: Bearer <token>`; the `token` query parameter is only
/// consulted when enabled with [`JwtMiddleware::allow_query_token`], and then
/// only for GET and HEAD requests.
pub struct JwtMiddleware {
    guard: AccessGuard,
    allow_query_token: bool,
}

impl JwtMiddleware {
    /// Create new JWT middleware instance
    pub fn new(guard: AccessGuard) -> Self {
        Self {
            guard,
            allow_query_token: false,
        }
    }

    /// Accept `?token=` as a lower-trust fallback on read-only requests
    pub fn allow_query_token(mut self) -> Self {
        self.allow_query_token = true;
        self
    }
}

/// Pull the raw access token off the request, header first
fn extract_token(req: &ServiceRequest, allow_query_token: bool) -> Option<String> {
    let from_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix(BEARER_PREFIX))
        .map(|token| token.trim().to_string());

    if from_header.is_some() {
        return from_header;
    }

    let read_only = req.method() == Method::GET || req.method() == Method::HEAD;
    if !allow_query_token || !read_only {
        return None;
    }

    web::Query::<HashMap<String, String>>::from_query(req.query_string())
        .ok()
        .and_then(|query| query.get(QUERY_TOKEN_PARAM).cloned())
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(JwtMiddlewareService {
            service: Rc::new(service),
            guard: self.guard.clone(),
            allow_query_token: self.allow_query_token,
        }))
    }
}

pub struct JwtMiddlewareService<S> {
    service: Rc<S>,
    guard: AccessGuard,
    allow_query_token: bool,
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareService<S>
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
        let token = extract_token(&req, self.allow_query_token);
        let guard = self.guard.clone();
        let service = self.service.clone();

        Box::pin(async move {
            let token = match token {
                Some(token) => token,
                None => {
                    tracing::warn!(path = %req.path(), "Missing bearer token");
                    return Err(AppError::Auth(AuthError::MissingToken).into());
                }
            };

            match guard.authenticate(&token).await {
                Ok(identity) => {
                    tracing::debug!(
                        user_id = %identity.id,
                        role = %identity.role,
                        "Access token validated"
                    );
                    req.extensions_mut().insert(identity);
                    service.call(req).await
                }
                Err(e) => {
                    tracing::warn!(path = %req.path(), error = %e, "Access token rejected");
                    Err(e.into())
                }
            }
        })
    }
}
