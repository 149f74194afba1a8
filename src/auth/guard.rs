//! Per-request principal resolution.
//!
//! The [`Guard`] is shared across requests and holds no request state. Each
//! request carries its own [`RequestContext`], which remembers the outcome of
//! the first resolution so the token is validated at most once per request.

use axum::http::{HeaderMap, header};
use serde::Deserialize;
use tracing::warn;

use super::password::verify_password;
use super::service::{JwtService, TOKEN_LABEL};
use crate::db::{Database, User};

/// Request-scoped authentication state.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    authorization: Option<String>,
    /// `None` until the guard has run; then the resolved user, if any.
    resolved: Option<Option<User>>,
}

impl RequestContext {
    pub fn new(authorization: Option<&str>) -> Self {
        Self {
            authorization: authorization.map(str::to_string),
            resolved: None,
        }
    }

    /// Build a context from the request's `Authorization` header.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let authorization = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok());
        Self::new(authorization)
    }

    pub fn authorization(&self) -> Option<&str> {
        self.authorization.as_deref()
    }

    /// The token part of a well-formed bearer credential.
    pub fn bearer_token(&self) -> Option<&str> {
        self.authorization()
            .and_then(split_credential)
            .map(|(_, token)| token)
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.is_some()
    }

    /// The cached user, if resolution already produced one.
    pub fn user(&self) -> Option<&User> {
        self.resolved.as_ref().and_then(Option::as_ref)
    }

    pub fn set_user(&mut self, user: User) {
        self.resolved = Some(Some(user));
    }
}

/// Split `"<label> <token>"` on the first space. Either half empty is a failure.
pub fn split_credential(value: &str) -> Option<(&str, &str)> {
    let (label, token) = value.split_once(' ')?;
    if label.is_empty() || token.is_empty() {
        return None;
    }
    Some((label, token))
}

/// Email and password as submitted to a login endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Credentials {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl Credentials {
    pub fn new(email: &str, password: &str) -> Self {
        Self {
            email: Some(email.to_string()),
            password: Some(password.to_string()),
        }
    }
}

#[derive(Clone)]
pub struct Guard {
    service: JwtService,
    db: Database,
}

impl Guard {
    pub fn new(service: JwtService, db: Database) -> Self {
        Self { service, db }
    }

    pub fn service(&self) -> &JwtService {
        &self.service
    }

    /// Resolve the request's user from its bearer credential, once.
    pub async fn user(&self, ctx: &mut RequestContext) -> Option<User> {
        if let Some(resolved) = &ctx.resolved {
            return resolved.clone();
        }

        let user = match ctx.authorization().and_then(split_credential) {
            Some((label, token)) => {
                // Auth schemes are case-insensitive; stored labels use one spelling.
                let label = if label.eq_ignore_ascii_case(TOKEN_LABEL) {
                    TOKEN_LABEL
                } else {
                    label
                };
                self.service
                    .validate_token(token, Some(label))
                    .await
                    .and_then(|record| record.user)
            }
            None => None,
        };

        ctx.resolved = Some(user.clone());
        user
    }

    pub async fn check(&self, ctx: &mut RequestContext) -> bool {
        self.user(ctx).await.is_some()
    }

    /// Internal ID of the resolved user.
    pub async fn id(&self, ctx: &mut RequestContext) -> Option<i64> {
        self.user(ctx).await.map(|user| user.id)
    }

    /// Check an email and password. On success the user becomes the request's principal.
    pub async fn validate(&self, ctx: &mut RequestContext, credentials: &Credentials) -> bool {
        let email = credentials.email.as_deref().filter(|s| !s.is_empty());
        let password = credentials.password.as_deref().filter(|s| !s.is_empty());
        let (Some(email), Some(password)) = (email, password) else {
            return false;
        };

        let user = match self.db.users().get_by_email(email).await {
            Ok(Some(user)) => user,
            Ok(None) => return false,
            Err(e) => {
                warn!(error = %e, "Failed to look up user");
                return false;
            }
        };

        match verify_password(password, &user.password_hash) {
            Ok(true) => {
                ctx.set_user(user);
                true
            }
            Ok(false) => false,
            Err(e) => {
                warn!(user = %user.uuid, error = %e, "Stored password hash is unreadable");
                false
            }
        }
    }
}
