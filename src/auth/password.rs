//! Password hashing and strength rules
//!
//! bcrypt is CPU-bound, so the async wrappers move the work onto the
//! blocking pool.

use thiserror::Error;

/// Minimum accepted password length
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Errors that can occur while hashing or checking passwords
#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("Password is not strong enough")]
    TooWeak,

    #[error("Password hashing failed: {0}")]
    HashFailed(String),
}

/// Strong means: at least 8 characters with an uppercase letter, a lowercase
/// letter, a digit and a symbol.
pub fn is_strong_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LENGTH
        && password.chars().any(|c| c.is_uppercase())
        && password.chars().any(|c| c.is_lowercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| !c.is_alphanumeric() && !c.is_whitespace())
}

/// Hash a password after enforcing the strength rules
pub async fn hash_password(password: String, cost: u32) -> Result<String, PasswordError> {
    if !is_strong_password(&password) {
        return Err(PasswordError::TooWeak);
    }

    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| PasswordError::HashFailed(e.to_string()))?
        .map_err(|e| PasswordError::HashFailed(e.to_string()))
}

/// Check a password against a stored bcrypt hash. Malformed hashes count as a mismatch.
pub async fn verify_password(password: String, hash: String) -> bool {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash).unwrap_or(false))
        .await
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_strength() {
        assert!(is_strong_password("Secret#123"));
        assert!(!is_strong_password("Sh0rt#1"));
        assert!(!is_strong_password("alllowercase#1"));
        assert!(!is_strong_password("ALLUPPERCASE#1"));
        assert!(!is_strong_password("NoDigits#here"));
        assert!(!is_strong_password("NoSymbol123"));
    }

    #[tokio::test]
    async fn test_hash_and_verify() {
        let hash = hash_password("Secret#123".to_string(), 4).await.unwrap();
        assert!(hash.starts_with("$2"));
        assert!(verify_password("Secret#123".to_string(), hash.clone()).await);
        assert!(!verify_password("Secret#124".to_string(), hash).await);
    }

    #[tokio::test]
    async fn test_weak_password_rejected_before_hashing() {
        let result = hash_password("password".to_string(), 4).await;
        assert!(matches!(result, Err(PasswordError::TooWeak)));
    }

    #[tokio::test]
    async fn test_verify_against_garbage_hash() {
        assert!(!verify_password("Secret#123".to_string(), "not-a-hash".to_string()).await);
    }
}
