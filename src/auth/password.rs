use crate::error::AppError;

pub fn hash(plaintext: &str, cost: u32) -> Result<String, AppError> {
    bcrypt::hash(plaintext, cost).map_err(|e| AppError::Internal(format!("bcrypt: {}", e)))
}

/// Constant-time via bcrypt; a malformed stored hash never verifies.
pub fn verify(plaintext: &str, hash: &str) -> bool {
    bcrypt::verify(plaintext, hash).unwrap_or(false)
}

/// `hash` on the blocking pool; bcrypt is deliberately slow.
pub async fn hash_blocking(plaintext: String, cost: u32) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hash(&plaintext, cost))
        .await
        .map_err(|e| AppError::Internal(format!("hash task: {}", e)))?
}

pub async fn verify_blocking(plaintext: String, hash: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || verify(&plaintext, &hash))
        .await
        .map_err(|e| AppError::Internal(format!("verify task: {}", e)))
}
