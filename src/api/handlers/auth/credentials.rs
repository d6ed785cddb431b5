//! Password hashing and verification.

use anyhow::{Result, anyhow};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

/// Hash a password with Argon2id and a fresh salt.
///
/// # Errors
/// Returns an error if hashing fails.
pub(super) fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("failed to hash password: {e}"))?;
    Ok(hash.to_string())
}

/// Verify a password against a stored PHC string.
///
/// Verification uses the parameters embedded in the hash itself.
///
/// # Errors
/// Returns an error if the stored hash cannot be parsed.
pub(super) fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| anyhow!("invalid password hash: {e}"))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_round_trip() {
        let hash = hash_password("pw123456").expect("hash");
        assert!(!hash.is_empty());
        assert!(verify_password("pw123456", &hash).expect("verify"));
        assert!(!verify_password("wrong-password", &hash).expect("verify"));
    }

    #[test]
    fn same_password_hashes_differently() {
        let first = hash_password("pw123456").expect("hash");
        let second = hash_password("pw123456").expect("hash");
        assert_ne!(first, second);
        assert!(verify_password("pw123456", &first).expect("verify"));
        assert!(verify_password("pw123456", &second).expect("verify"));
    }

    #[test]
    fn garbage_hash_is_an_error() {
        assert!(verify_password("pw123456", "not-a-phc-string").is_err());
    }
}
