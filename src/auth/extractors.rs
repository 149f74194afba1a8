//! Axum extractors for authentication.
//!
//! The request's [`RequestContext`] lives in the request extensions, so any
//! number of extractors in one request share a single token validation.

use axum::{extract::FromRequestParts, http::request::Parts};

use super::errors::{ApiAuthError, AuthErrorKind};
use super::guard::RequestContext;
use super::state::HasAuthBackend;
use crate::db::User;

/// Run the guard against the request's context, creating the context on first use.
async fn resolve_user<S>(parts: &mut Parts, state: &S) -> Option<User>
where
    S: HasAuthBackend + Send + Sync,
{
    let mut ctx = parts
        .extensions
        .remove::<RequestContext>()
        .unwrap_or_else(|| RequestContext::from_headers(&parts.headers));

    let user = state.guard().user(&mut ctx).await;
    parts.extensions.insert(ctx);
    user
}

/// Extractor for endpoints that require a signed-in user.
pub struct Auth(pub User);

impl<S> FromRequestParts<S> for Auth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        resolve_user(parts, state)
            .await
            .map(Auth)
            .ok_or_else(|| ApiAuthError::new(AuthErrorKind::NotAuthenticated))
    }
}

/// Extractor for endpoints restricted to admins.
pub struct AdminAuth(pub User);

impl<S> FromRequestParts<S> for AdminAuth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = resolve_user(parts, state)
            .await
            .ok_or_else(|| ApiAuthError::new(AuthErrorKind::NotAuthenticated))?;

        if !user.is_admin() {
            return Err(ApiAuthError::new(AuthErrorKind::InsufficientRole));
        }

        Ok(AdminAuth(user))
    }
}
