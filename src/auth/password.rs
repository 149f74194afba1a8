//! Credential hashing for the email and password login path.
//!
//! Stored values are argon2id PHC strings. A stored value that cannot be read
//! as one is an error rather than a mismatch, so a corrupt row is logged
//! instead of looking like a wrong password.

use argon2::password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;

const SALT_LEN: usize = 16;

fn hasher() -> Argon2<'static> {
    Argon2::new(Algorithm::Argon2id, Version::V0x13, Params::default())
}

pub fn hash_password(plain: &str) -> Result<String, password_hash::Error> {
    let mut bytes = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut bytes);
    let salt = SaltString::encode_b64(&bytes)?;
    hasher()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
}

/// `Ok(false)` for a wrong password, `Err` for an unreadable stored hash.
pub fn verify_password(plain: &str, stored: &str) -> Result<bool, password_hash::Error> {
    let stored = PasswordHash::new(stored)?;
    match hasher().verify_password(plain.as_bytes(), &stored) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(e),
    }
}
