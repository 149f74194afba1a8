//! JWT encoding, parsing and signature verification.
//!
//! Tokens are HS256-signed compact JWS strings (`header.claims.signature`).
//! Parsing is independent of the key so that a token can be looked up before
//! its signature is checked. Expiry is not enforced here; callers compare
//! `exp` against their own clock.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Claims carried by every issued token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Issuer (service base URL)
    pub iss: String,
    /// Subject (the user's public UUID)
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Internal user ID
    pub uid: i64,
    /// JWT ID, unique per issuance
    pub jti: String,
}

impl Claims {
    /// Build claims for a fresh issuance with a random JTI.
    pub fn new(issuer: &str, subject: &str, issued_at: u64, expires_at: u64, uid: i64) -> Self {
        Self {
            iss: issuer.to_string(),
            sub: subject.to_string(),
            iat: issued_at,
            exp: expires_at,
            uid,
            jti: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn is_expired(&self, now: u64) -> bool {
        self.exp <= now
    }
}

/// Signing configuration: shared secret and algorithm.
#[derive(Clone)]
pub struct JwtConfig {
    algorithm: Algorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtConfig {
    /// Create a new JWT configuration with the given raw secret.
    pub fn new(secret: &[u8]) -> Self {
        Self {
            algorithm: Algorithm::HS256,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    /// Sign the claims into a compact token string.
    pub fn encode(&self, claims: &Claims) -> Result<String, JwtError> {
        jsonwebtoken::encode(&Header::new(self.algorithm), claims, &self.encoding_key)
            .map_err(JwtError::Encoding)
    }

    /// Recompute the signature over `header.claims` and compare.
    /// Returns false for any mismatch or undecodable token.
    pub fn verify_signature(&self, token: &str) -> bool {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &validation).is_ok()
    }
}

/// Decode a base64 secret, rejecting empty results.
pub fn decode_secret(secret: &str) -> Result<Vec<u8>, JwtError> {
    let bytes = STANDARD
        .decode(secret.trim())
        .map_err(|_| JwtError::InvalidSecret)?;
    if bytes.is_empty() {
        return Err(JwtError::InvalidSecret);
    }
    Ok(bytes)
}

/// Split a token into its three segments and decode the claims without
/// checking the signature.
pub fn parse(token: &str) -> Result<Claims, JwtError> {
    let mut segments = token.split('.');
    let (Some(header), Some(claims), Some(signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(JwtError::Malformed("expected three segments"));
    };

    if header.is_empty() || claims.is_empty() || signature.is_empty() {
        return Err(JwtError::Malformed("empty segment"));
    }

    let _header: Header = decode_segment(header)?;
    URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|_| JwtError::Malformed("signature is not base64url"))?;

    decode_segment(claims)
}

fn decode_segment<T: DeserializeOwned>(segment: &str) -> Result<T, JwtError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| JwtError::Malformed("segment is not base64url"))?;
    serde_json::from_slice(&bytes).map_err(|_| JwtError::Malformed("segment is not valid JSON"))
}

/// Errors that can occur during JWT operations.
#[derive(Debug)]
pub enum JwtError {
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// Token does not have the compact JWS shape
    Malformed(&'static str),
    /// Signing secret is not valid base64
    InvalidSecret,
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            JwtError::Malformed(reason) => write!(f, "Malformed token: {}", reason),
            JwtError::InvalidSecret => write!(f, "JWT secret must be non-empty base64"),
        }
    }
}

impl std::error::Error for JwtError {}
