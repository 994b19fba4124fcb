//! Password hashing
//!
//! Argon2id with a fresh salt per hash. Hashing is CPU-bound, so the async
//! wrappers move it onto the blocking pool.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;

use crate::db::StoreError;

/// Hash a password using Argon2id
pub fn hash_password(password: &str) -> Result<String, StoreError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| StoreError::Hashing(e.to_string()))
}

/// Verify a password against a stored hash
pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, StoreError> {
    let parsed = PasswordHash::new(password_hash)
        .map_err(|e| StoreError::Hashing(format!("invalid password hash format: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

pub async fn hash_password_async(password: String) -> Result<String, StoreError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| StoreError::Hashing(e.to_string()))?
}

pub async fn verify_password_async(password: String, password_hash: String) -> Result<bool, StoreError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &password_hash))
        .await
        .map_err(|e| StoreError::Hashing(e.to_string()))?
}
