//! Argon2id password hashing in PHC string format.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

use super::service::AuthError;

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AuthError::Credential(format!("failed to hash password: {err}")))
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|err| AuthError::Credential(format!("stored hash is malformed: {err}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Burn a verification's worth of work against a throwaway hash so a login
/// against an unknown contact takes as long as one against a known contact.
pub fn neutral_verify(password: &str) {
    static NEUTRAL_HASH: std::sync::OnceLock<Option<String>> = std::sync::OnceLock::new();
    let hash = NEUTRAL_HASH.get_or_init(|| hash_password("timing-neutral-filler").ok());
    if let Some(hash) = hash {
        let _ = verify_password(password, hash);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_round_trip() {
        let hash = hash_password("secret1").expect("hashes");
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("secret1", &hash).expect("verifies"));
        assert!(!verify_password("secret2", &hash).expect("verifies"));
    }

    #[test]
    fn salts_differ_between_hashes() {
        let first = hash_password("same-password").expect("hashes");
        let second = hash_password("same-password").expect("hashes");
        assert_ne!(first, second);
    }

    #[test]
    fn malformed_hash_is_an_error() {
        assert!(verify_password("whatever", "not-a-phc-string").is_err());
    }
}
