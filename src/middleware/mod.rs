use actix_session::{Session, SessionExt};
use actix_web::{
    body::EitherBody,
    dev::{self, forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web, Error, FromRequest, HttpMessage, HttpRequest, ResponseError,
};
use chrono::{Duration, Utc};
use futures_util::future::{ok, LocalBoxFuture, Ready};
use std::future::{ready, Ready as StdReady};

use crate::error::{CmsError, CmsResult};
use crate::helper::auth_helpers;
use crate::models::{Capability, Identity, Role, User};
use crate::DbPool;

const SESSION_USER_ID: &str = "userId";
const SESSION_EMAIL: &str = "email";
const SESSION_ROLE: &str = "role";
const SESSION_EXPIRES_AT: &str = "expiresAt";

fn session_error(e: impl std::fmt::Display) -> CmsError {
    CmsError::Persistence(format!("session: {}", e))
}

/// Stores the identity of `user` in a fresh session that expires after `ttl`.
pub fn start_session(session: &Session, user: &User, ttl: Duration) -> CmsResult<()> {
    session.renew();
    let expires_at = (Utc::now() + ttl).timestamp();
    session.insert(SESSION_USER_ID, user.id).map_err(session_error)?;
    session.insert(SESSION_EMAIL, &user.email).map_err(session_error)?;
    session.insert(SESSION_ROLE, user.role.as_str()).map_err(session_error)?;
    session.insert(SESSION_EXPIRES_AT, expires_at).map_err(session_error)?;
    Ok(())
}

pub fn end_session(session: &Session) {
    session.purge();
}

/// Reads the session identity; `None` when absent, malformed or expired.
fn session_identity(session: &Session) -> Option<Identity> {
    let user_id = session.get::<i64>(SESSION_USER_ID).ok()??;
    let email = session.get::<String>(SESSION_EMAIL).ok()??;
    let role = session.get::<String>(SESSION_ROLE).ok()??.parse::<Role>().ok()?;
    let expires_at = session.get::<i64>(SESSION_EXPIRES_AT).ok()??;
    if expires_at <= Utc::now().timestamp() {
        log::info!("Session for user {} expired", user_id);
        session.purge();
        return None;
    }
    Some(Identity { user_id, email, role })
}

/// The session identity backed by an account that still exists and is
/// active. The stored role wins over the one in the cookie.
fn resolve_user(session: &Session, pool: Option<&web::Data<DbPool>>) -> CmsResult<User> {
    let identity = session_identity(session).ok_or(CmsError::Unauthenticated)?;
    let pool = pool.ok_or_else(|| CmsError::Persistence("connection pool not configured".to_string()))?;
    match auth_helpers::active_user(pool, identity.user_id)? {
        Some(user) => Ok(user),
        None => {
            log::warn!("Session for user {} no longer maps to an active account", identity.user_id);
            session.purge();
            Err(CmsError::Unauthenticated)
        }
    }
}

fn request_user(req: &HttpRequest) -> CmsResult<User> {
    if let Some(user) = req.extensions().get::<User>() {
        return Ok(user.clone());
    }
    resolve_user(&req.get_session(), req.app_data::<web::Data<DbPool>>())
}

/// The logged-in, active user behind the request.
pub struct AuthenticatedUser(pub User);

impl AuthenticatedUser {
    pub fn identity(&self) -> Identity {
        self.0.identity()
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = CmsError;
    type Future = StdReady<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        ready(request_user(req).map(AuthenticatedUser))
    }
}

/// Like [`AuthenticatedUser`] but anonymous requests pass through as `None`.
pub struct MaybeUser(pub Option<User>);

impl FromRequest for MaybeUser {
    type Error = CmsError;
    type Future = StdReady<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        let resolved = match request_user(req) {
            Ok(user) => Ok(MaybeUser(Some(user))),
            Err(CmsError::Unauthenticated) => Ok(MaybeUser(None)),
            Err(e) => Err(e),
        };
        ready(resolved)
    }
}

/// Client address, preferring the first X-Forwarded-For entry set by a
/// reverse proxy.
pub fn client_ip(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| req.peer_addr().map(|addr| addr.ip().to_string()))
}

/// Gates a scope on a capability. Anonymous requests get 401, identities
/// lacking the capability get 403. The resolved user is left in the request
/// extensions for [`AuthenticatedUser`].
pub struct RequireCapability(pub Capability);

impl<S, B> Transform<S, ServiceRequest> for RequireCapability
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RequireCapabilityMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(RequireCapabilityMiddleware {
            service,
            capability: self.0,
        })
    }
}

pub struct RequireCapabilityMiddleware<S> {
    service: S,
    capability: Capability,
}

impl<S, B> Service<ServiceRequest> for RequireCapabilityMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let session = req.get_session();
        let verdict = resolve_user(&session, req.app_data::<web::Data<DbPool>>()).and_then(|user| {
            auth_helpers::require_capability(&user.identity(), self.capability)?;
            Ok(user)
        });

        match verdict {
            Ok(user) => {
                req.extensions_mut().insert(user);
                let fut = self.service.call(req);
                Box::pin(async move {
                    let res = fut.await?;
                    Ok(res.map_into_left_body())
                })
            }
            Err(e) => Box::pin(async move {
                let (http_req, _payload) = req.into_parts();
                let res = e.error_response().map_into_right_body();
                Ok(ServiceResponse::new(http_req, res))
            }),
        }
    }
}
