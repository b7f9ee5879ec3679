/// Role Guard Middleware
///
/// Admits a request only if the `AuthenticatedUser` placed in extensions by
/// `JwtMiddleware` holds one of the allowed roles. Must sit inside the JWT
/// middleware (wrapped before it).

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;

use crate::auth::{AuthenticatedUser, Role};
use crate::error::{AppError, AuthError};

pub struct RoleGuard {
    allowed: Rc<Vec<Role>>,
}

impl RoleGuard {
    pub fn new(allowed: &[Role]) -> Self {
        Self {
            allowed: Rc::new(allowed.to_vec()),
        }
    }
}

/// Authorization decision, usable outside the middleware
pub fn authorize(user: &AuthenticatedUser, allowed: &[Role]) -> Result<(), AppError> {
    if allowed.contains(&user.role) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "Role '{}' may not access this resource",
            user.role
        )))
    }
}

impl<S, B> Transform<S, ServiceRequest> for RoleGuard
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
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
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let user = req.extensions().get::<AuthenticatedUser>().copied();

        let decision = match user {
            // No identity means the JWT middleware was not in front of us
            None => Err(AppError::from(AuthError::MissingToken)),
            Some(user) => authorize(&user, &self.allowed).map_err(|e| {
                tracing::warn!(
                    user_id = user.user_id,
                    role = %user.role,
                    path = %req.path(),
                    "Access denied by role guard"
                );
                e
            }),
        };

        match decision {
            Ok(()) => {
                let service = self.service.clone();
                Box::pin(async move { Ok(service.call(req).await?.map_into_left_body()) })
            }
            Err(e) => {
                let res = req.error_response(e);
                Box::pin(async move { Ok(res.map_into_right_body()) })
            }
        }
    }
}
