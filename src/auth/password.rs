use argon2::{password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand::rngs::OsRng;
use rand::Rng;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::AuthError;

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hash(e.to_string()))
}

/// False for a mismatch and for a stored value that is not a valid hash.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok(),
        Err(_) => false,
    }
}

/// Hex SHA-256 of a one-time code. Only digests are persisted.
pub fn digest(code: &str) -> String {
    hex::encode(Sha256::digest(code.as_bytes()))
}

pub fn numeric_code(digits: u32) -> String {
    let digits = digits.clamp(4, 12);
    (0..digits).map(|_| char::from(b'0' + OsRng.gen_range(0..10u8))).collect()
}

pub fn recovery_code() -> String {
    Uuid::new_v4().simple().to_string()
}

/// A hash nobody knows the password for, used by accounts created through a
/// social sign-in.
pub fn unusable_password() -> Result<String, AuthError> {
    hash_password(&format!("{}{}", Uuid::new_v4(), Uuid::new_v4()))
}
