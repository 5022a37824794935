//! Password hashing and verification
//!
//! Uses bcrypt for secure password hashing. Both operations are CPU-bound and
//! deliberately slow; async callers run them on the blocking pool.

use crate::error::AppError;
use bcrypt::{hash, verify};

/// bcrypt hasher with a configured work factor
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    /// Hash a password using bcrypt
    pub fn hash(&self, password: &str) -> Result<String, AppError> {
        hash(password, self.cost)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
    }

    /// Verify a password against a hash
    pub fn verify(&self, password: &str, digest: &str) -> Result<bool, AppError> {
        verify(password, digest)
            .map_err(|e| AppError::Internal(format!("Failed to verify password: {}", e)))
    }

    /// `hash` on the blocking pool
    pub async fn hash_blocking(&self, password: String) -> Result<String, AppError> {
        let hasher = *self;
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))?
    }

    /// `verify` on the blocking pool
    pub async fn verify_blocking(&self, password: String, digest: String) -> Result<bool, AppError> {
        let hasher = *self;
        tokio::task::spawn_blocking(move || hasher.verify(&password, &digest))
            .await
            .map_err(|e| AppError::Internal(format!("Password verification task failed: {}", e)))?
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_then_verify() {
        let hasher = PasswordHasher::new(4);
        let digest = hasher.hash("correct horse").unwrap();

        assert_ne!(digest, "correct horse");
        assert!(hasher.verify("correct horse", &digest).unwrap());
        assert!(!hasher.verify("wrong horse", &digest).unwrap());
    }

    #[test]
    fn test_hashes_are_salted() {
        let hasher = PasswordHasher::new(4);
        let a = hasher.hash("same").unwrap();
        let b = hasher.hash("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_garbage_digest_is_an_error() {
        let hasher = PasswordHasher::new(4);
        assert!(hasher.verify("anything", "not-a-bcrypt-hash").is_err());
    }

    #[tokio::test]
    async fn test_blocking_variants() {
        let hasher = PasswordHasher::new(4);
        let digest = hasher.hash_blocking("s3cret".to_string()).await.unwrap();
        assert!(hasher
            .verify_blocking("s3cret".to_string(), digest)
            .await
            .unwrap());
    }
}
