// Password hashing and verification utilities using bcrypt
// Both calls are CPU bound; request handlers run them on the blocking pool.

use rand::{distributions::Alphanumeric, Rng};
use thiserror::Error;

/// Errors that can occur during password operations
#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashingError(String),

    #[error("Failed to verify password: {0}")]
    VerificationError(String),

    #[error("Invalid password hash format")]
    InvalidHashFormat,
}

/// Hash a password with bcrypt at the given cost
///
/// # Example
/// ```
/// let hashed = saas_starter::utils::hash_password("my_secure_password", 4).unwrap();
/// assert!(hashed.starts_with("$2b$04$"));
/// ```
pub fn hash_password(password: &str, cost: u32) -> Result<String, PasswordError> {
    bcrypt::hash(password, cost).map_err(|e| PasswordError::HashingError(e.to_string()))
}

/// Verify a password against a bcrypt hash
///
/// Returns `Ok(false)` on mismatch and an error only when the stored hash is unusable.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    match bcrypt::verify(password, hash) {
        Ok(valid) => Ok(valid),
        Err(bcrypt::BcryptError::InvalidHash(_))
        | Err(bcrypt::BcryptError::InvalidPrefix(_))
        | Err(bcrypt::BcryptError::InvalidCost(_)) => Err(PasswordError::InvalidHashFormat),
        Err(e) => Err(PasswordError::VerificationError(e.to_string())),
    }
}

/// Hash a throwaway random password for accounts created through OAuth
pub fn hash_random_password(cost: u32) -> Result<String, PasswordError> {
    let random: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();
    hash_password(&random, cost)
}
