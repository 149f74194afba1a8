//! Token issuance, validation and revocation.
//!
//! A token is accepted only if it parses, has a stored record, the record
//! still has an owner, it has not expired, and its signature, subject and
//! `uid` claim all match that owner. A token failing the last group of
//! checks has its record deleted. Every rejection looks the same to callers.

use std::num::NonZeroU32;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::clock::Clock;
use crate::db::{Database, TokenRecord, User};
use crate::jwt::{self, Claims, JwtConfig, JwtError};

/// Label stored with every issued token and expected in the Authorization header.
pub const TOKEN_LABEL: &str = "Bearer";

#[derive(Clone)]
pub struct JwtService {
    db: Database,
    jwt: JwtConfig,
    clock: Arc<dyn Clock>,
    issuer: String,
    ttl_minutes: NonZeroU32,
}

impl JwtService {
    pub fn new(
        db: Database,
        jwt: JwtConfig,
        clock: Arc<dyn Clock>,
        issuer: impl Into<String>,
        ttl_minutes: NonZeroU32,
    ) -> Self {
        Self {
            db,
            jwt,
            clock,
            issuer: issuer.into(),
            ttl_minutes,
        }
    }

    fn ttl_secs(&self) -> u64 {
        u64::from(self.ttl_minutes.get()) * 60
    }

    /// Mint and store a new token for `user`. Existing tokens are left alone.
    pub async fn request_token(&self, user: &User) -> Result<TokenRecord, ServiceError> {
        let now = self.clock.now();
        let claims = Claims::new(&self.issuer, &user.uuid, now, now + self.ttl_secs(), user.id);

        let token = self.jwt.encode(&claims).map_err(ServiceError::Jwt)?;

        let record = self
            .db
            .tokens()
            .create(user, &token, TOKEN_LABEL, claims.exp, now)
            .await
            .map_err(ServiceError::Database)?;

        debug!(user = %user.uuid, token_id = record.id, expires_at = claims.exp, "Issued token");
        Ok(record)
    }

    /// Return the stored record for a valid token, or `None` for any rejection.
    pub async fn validate_token(&self, token: &str, label: Option<&str>) -> Option<TokenRecord> {
        let claims = match jwt::parse(token) {
            Ok(claims) => claims,
            Err(e) => {
                debug!(error = %e, "Rejected unparseable token");
                return None;
            }
        };

        let record = match self.db.tokens().find_by_token(token, label).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!("Rejected unknown token");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Failed to look up token");
                return None;
            }
        };

        // The owner must be present before any claim can be compared against it.
        let Some(user) = record.user.as_ref() else {
            debug!(token_id = record.id, "Rejected orphaned token");
            return None;
        };

        // Expired records are kept; only tampering removes them.
        if claims.is_expired(self.clock.now()) {
            debug!(token_id = record.id, expires_at = claims.exp, "Rejected expired token");
            return None;
        }

        if !self.is_intact(token, &claims, user) {
            warn!(token_id = record.id, user = %user.uuid, "Token failed integrity check, deleting");
            self.discard(&record).await;
            return None;
        }

        Some(record)
    }

    /// Delete a tampered record. Another request may have deleted it first.
    async fn discard(&self, record: &TokenRecord) {
        match self.db.tokens().delete(record).await {
            Ok(true) => {}
            Ok(false) => debug!(token_id = record.id, "Token was already deleted"),
            Err(e) => warn!(token_id = record.id, error = %e, "Failed to delete token"),
        }
    }

    fn is_intact(&self, token: &str, claims: &Claims, user: &User) -> bool {
        if !self.jwt.verify_signature(token) {
            return false;
        }
        if claims.sub != user.uuid {
            return false;
        }
        claims.uid == user.id
    }

    /// Delete the record of a valid token. Tokens that do not validate count as
    /// already revoked, so this only returns false when the delete itself fails.
    pub async fn revoke_token(&self, token: &str) -> bool {
        let Some(record) = self.validate_token(token, None).await else {
            return true;
        };

        match self.db.tokens().delete(&record).await {
            Ok(_) => {
                debug!(token_id = record.id, "Revoked token");
                true
            }
            Err(e) => {
                warn!(token_id = record.id, error = %e, "Failed to revoke token");
                false
            }
        }
    }
}

/// Errors that can occur while issuing a token.
#[derive(Debug)]
pub enum ServiceError {
    Jwt(JwtError),
    Database(sqlx::Error),
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::Jwt(e) => write!(f, "{}", e),
            ServiceError::Database(e) => write!(f, "Failed to store token: {}", e),
        }
    }
}

impl std::error::Error for ServiceError {}
