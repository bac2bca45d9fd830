/// Bearer-token authentication middleware.
///
/// Protects a scope: extracts the `Authorization: Bearer` header, validates
/// the access token, consults the revocation store and injects the
/// reconstructed `Principal` into request extensions. Routes outside the
/// protected scopes never consult this middleware, so unauthenticated access
/// to public endpoints stays anonymous rather than erroring.
///
/// The blacklist check is fail-closed: if the revocation store cannot be
/// reached the request is answered 503, never waved through.
use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;

use crate::auth::{token_digest, validate_access_token};
use crate::blacklist::TokenBlacklist;
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};

/// Raw compact token as presented by the client, kept for logout
#[derive(Clone)]
pub struct BearerToken(pub String);

pub struct AuthMiddleware {
    jwt_config: JwtSettings,
    blacklist: TokenBlacklist,
}

impl AuthMiddleware {
    pub fn new(jwt_config: JwtSettings, blacklist: TokenBlacklist) -> Self {
        Self {
            jwt_config,
            blacklist,
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(AuthMiddlewareService {
            service: Rc::new(service),
            jwt_config: self.jwt_config.clone(),
            blacklist: self.blacklist.clone(),
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: Rc<S>,
    jwt_config: JwtSettings,
    blacklist: TokenBlacklist,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
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
        let jwt_config = self.jwt_config.clone();
        let blacklist = self.blacklist.clone();
        let service = self.service.clone();

        Box::pin(async move {
            let token = req
                .headers()
                .get("Authorization")
                .and_then(|h| h.to_str().ok())
                .and_then(|h| h.strip_prefix("Bearer "))
                .map(str::to_owned);

            let token = match token {
                Some(token) => token,
                None => {
                    tracing::warn!("Missing or invalid Authorization header");
                    return Err(AppError::Auth(AuthError::MissingToken).into());
                }
            };

            let claims = validate_access_token(&token, &jwt_config).map_err(|e| {
                tracing::warn!("Access token rejected: {}", e);
                Error::from(e)
            })?;

            // fail-closed: an unreachable revocation store rejects the
            // request (503) instead of passing the token
            if blacklist.is_blacklisted(&token_digest(&token)).await? {
                tracing::warn!(user_id = %claims.sub, "Blacklisted token presented");
                return Err(AppError::Auth(AuthError::TokenRevoked).into());
            }

            let principal = claims.to_principal()?;

            tracing::debug!(
                user_id = %principal.id,
                username = %principal.username,
                "Request authenticated"
            );

            req.extensions_mut().insert(principal);
            req.extensions_mut().insert(claims);
            req.extensions_mut().insert(BearerToken(token));

            service.call(req).await
        })
    }
}
