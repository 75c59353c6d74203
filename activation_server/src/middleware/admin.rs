//! Bearer-token guard for the operator endpoints.
//!
//! Wrap any scope or resource with [`AdminAuthMiddlewareFactory`]. Requests must carry
//! `Authorization: Bearer <TAE_ADMIN_TOKEN>`. If no token is configured, every request is refused.

use std::rc::Rc;

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::AUTHORIZATION,
    Error,
};
use futures::future::{ok, LocalBoxFuture, Ready};
use log::*;
use tae_common::Secret;

use crate::errors::ServerError;

pub struct AdminAuthMiddlewareFactory {
    token: Secret<String>,
}

impl AdminAuthMiddlewareFactory {
    pub fn new(token: Secret<String>) -> Self {
        AdminAuthMiddlewareFactory { token }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AdminAuthMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = AdminAuthMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AdminAuthMiddlewareService { token: self.token.clone(), service: Rc::new(service) })
    }
}

pub struct AdminAuthMiddlewareService<S> {
    token: Secret<String>,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AdminAuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let authorised = !self.token.is_unset() && bearer_token(&req) == Some(self.token.reveal().as_str());
        Box::pin(async move {
            if authorised {
                trace!("💻️ Admin token accepted for {}", req.path());
                service.call(req).await
            } else {
                warn!("💻️ Refusing admin request to {} without a valid token", req.path());
                Err(ServerError::Unauthorized.into())
            }
        })
    }
}

fn bearer_token(req: &ServiceRequest) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}
