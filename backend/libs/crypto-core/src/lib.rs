//! Shared credential primitives for LearningPulse services
//!
//! - [`jwt`]: HS256 session tokens issued at login and verified per request
//! - [`password`]: Argon2id password hashing

pub mod jwt;
pub mod password;

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("JWT secret must be at least {min} bytes")]
    WeakSecret { min: usize },

    #[error("failed to sign token: {0}")]
    Signing(String),

    #[error("token expired")]
    TokenExpired,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("invalid password hash format: {0}")]
    InvalidHash(String),
}

pub type Result<T> = std::result::Result<T, CryptoError>;
