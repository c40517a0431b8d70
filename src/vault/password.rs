//! Password gate: policy check and Argon2id verification hash.
//!
//! The hash only gates access; it is never used to derive an encryption key.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

use crate::error::{WalletError, WalletResult};

/// Reject passwords shorter than `min_len` characters.
pub fn check_policy(password: &str, min_len: usize) -> WalletResult<()> {
    if password.chars().count() < min_len {
        return Err(WalletError::WeakPassword { min_len });
    }
    Ok(())
}

/// Hash a password into a PHC string with a fresh salt.
pub fn hash_password(password: &str) -> WalletResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| WalletError::Internal(format!("password hashing failed: {}", e)))
}

/// Check a password against a stored PHC string.
pub fn verify_password(password: &str, stored: &str) -> WalletResult<bool> {
    let parsed = PasswordHash::new(stored)
        .map_err(|_| WalletError::Storage("stored password hash is malformed".into()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("Abc12345!").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("Abc12345!", &hash).unwrap());
        assert!(!verify_password("abc12345!", &hash).unwrap());

        // Fresh salt every time.
        assert_ne!(hash, hash_password("Abc12345!").unwrap());
    }

    #[test]
    fn test_policy() {
        assert!(check_policy("Abc12345!", 8).is_ok());
        assert!(matches!(
            check_policy("short", 8),
            Err(WalletError::WeakPassword { min_len: 8 })
        ));
        assert!(verify_password("x", "not-a-phc-string").is_err());
    }
}
