use crate::error::AppError;
use bcrypt::{hash, verify};
use std::sync::Arc;

pub fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    hash(password, cost)
        .map_err(|e| AppError::InternalServerError(format!("Failed to hash password: {}", e)))
}

pub fn verify_password(password: &str, hashed_password: &str) -> Result<bool, AppError> {
    verify(password, hashed_password)
        .map_err(|e| AppError::InternalServerError(format!("Failed to verify password: {}", e)))
}

/// Hashes and verifies passwords with bcrypt on the blocking thread pool.
///
/// bcrypt is deliberately slow, so both operations run through
/// `tokio::task::spawn_blocking` instead of on the request's executor thread.
/// bcrypt's own comparison of the digests is constant-time.
#[derive(Clone)]
pub struct PasswordVerifier {
    cost: u32,
    /// Hash checked when the login identifier is unknown, so that path costs
    /// the same as a wrong password.
    dummy_hash: Arc<str>,
}

impl std::fmt::Debug for PasswordVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordVerifier")
            .field("cost", &self.cost)
            .finish_non_exhaustive()
    }
}

impl PasswordVerifier {
    pub fn new(cost: u32) -> Result<Self, AppError> {
        let dummy_hash = hash_password("taskvault-dummy-password", cost)?;
        Ok(Self {
            cost,
            dummy_hash: dummy_hash.into(),
        })
    }

    pub async fn hash(&self, password: String) -> Result<String, AppError> {
        let cost = self.cost;
        tokio::task::spawn_blocking(move || hash_password(&password, cost)).await?
    }

    pub async fn verify(&self, password: String, hashed_password: String) -> Result<bool, AppError> {
        tokio::task::spawn_blocking(move || verify_password(&password, &hashed_password)).await?
    }

    /// Burns one verification's worth of work and always reports a mismatch.
    pub async fn verify_dummy(&self, password: String) -> Result<bool, AppError> {
        let dummy = Arc::clone(&self.dummy_hash);
        tokio::task::spawn_blocking(move || verify_password(&password, &dummy)).await??;
        Ok(false)
    }
}
