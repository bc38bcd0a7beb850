use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

use crate::error::ApiError;

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Minimum-strength policy. Composition rules (uppercase, digits, symbols)
/// can be added here without touching callers.
pub fn validate_password(plain: &str) -> Result<(), ApiError> {
    if plain.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::WeakPassword);
    }
    Ok(())
}

pub fn hash_password(plain: &str) -> Result<String, ApiError> {
    validate_password(plain)?;
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            ApiError::Internal(anyhow::anyhow!(e.to_string()))
        })?
        .to_string();
    Ok(hash)
}

/// Succeeds iff the password matches the stored hash. A mismatch and a
/// malformed hash are indistinguishable to the caller; the malformed case is
/// logged server-side.
pub fn verify_password(plain: &str, hash: &str) -> Result<(), ApiError> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "malformed password hash");
        ApiError::InvalidCredentials
    })?;
    Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .map_err(|_| ApiError::InvalidCredentials)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let password = "Secur3P@ssw0rd!";
        let hash = hash_password(password).expect("hashing should succeed");
        verify_password(password, &hash).expect("verify should succeed");
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let password = "correct-horse-battery-staple";
        let hash = hash_password(password).expect("hashing should succeed");
        let err = verify_password("wrong-password", &hash).unwrap_err();
        assert!(matches!(err, ApiError::InvalidCredentials));
    }

    #[test]
    fn verify_rejects_malformed_hash_identically() {
        let err = verify_password("anything", "not-a-valid-hash").unwrap_err();
        assert!(matches!(err, ApiError::InvalidCredentials));
    }

    #[test]
    fn short_password_is_weak() {
        assert!(matches!(
            validate_password("hunter2"),
            Err(ApiError::WeakPassword)
        ));
        assert!(matches!(hash_password("short"), Err(ApiError::WeakPassword)));
    }

    #[test]
    fn eight_chars_pass_policy() {
        validate_password("12345678").expect("exactly 8 chars is acceptable");
    }
}
