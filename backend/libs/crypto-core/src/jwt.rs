/// Session tokens for LearningPulse
///
/// Tokens are HS256-signed with a shared secret loaded from configuration.
/// The gateway both issues them (at login) and validates them (once per
/// request), so a symmetric key is sufficient.
///
/// ## Usage
///
/// ```rust
/// use crypto_core::jwt::JwtManager;
/// use uuid::Uuid;
///
/// let manager = JwtManager::new("a-secret-of-at-least-16-bytes", "learningpulse", 3600).unwrap();
/// let token = manager.issue_token(Uuid::new_v4(), "ada@example.com", "ada").unwrap();
/// let claims = manager.validate_token(&token).unwrap();
/// assert_eq!(claims.username, "ada");
/// ```
use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CryptoError, Result};

// ============================================================================
// Constants
// ============================================================================

const JWT_ALGORITHM: Algorithm = Algorithm::HS256;

/// Minimum secret length accepted by [`JwtManager::new`]
pub const MIN_SECRET_BYTES: usize = 16;

// ============================================================================
// Data Structures
// ============================================================================

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issuer
    pub iss: String,
    pub email: String,
    pub username: String,
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.sub)
            .map_err(|e| CryptoError::InvalidToken(format!("subject is not a UUID: {e}")))
    }
}

/// Issues and validates session tokens
#[derive(Clone)]
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    expiry: Duration,
}

impl std::fmt::Debug for JwtManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtManager")
            .field("issuer", &self.issuer)
            .field("expiry_seconds", &self.expiry.num_seconds())
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl JwtManager {
    /// Build a manager from a shared secret
    ///
    /// ## Errors
    ///
    /// Returns [`CryptoError::WeakSecret`] when the secret is shorter than
    /// [`MIN_SECRET_BYTES`].
    pub fn new(secret: &str, issuer: &str, expiry_seconds: i64) -> Result<Self> {
        if secret.len() < MIN_SECRET_BYTES {
            return Err(CryptoError::WeakSecret {
                min: MIN_SECRET_BYTES,
            });
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.to_string(),
            expiry: Duration::seconds(expiry_seconds),
        })
    }

    /// Token lifetime in seconds
    pub fn expires_in(&self) -> i64 {
        self.expiry.num_seconds()
    }

    // ========================================================================
    // Token Generation
    // ========================================================================

    /// Generate a signed session token for a user
    pub fn issue_token(&self, user_id: Uuid, email: &str, username: &str) -> Result<String> {
        let now = Utc::now();
        let expiry = now + self.expiry;

        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: expiry.timestamp(),
            iss: self.issuer.clone(),
            email: email.to_string(),
            username: username.to_string(),
        };

        encode(&Header::new(JWT_ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| CryptoError::Signing(e.to_string()))
    }

    // ========================================================================
    // Token Validation
    // ========================================================================

    /// Validate signature, expiry and issuer, returning the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(JWT_ALGORITHM);
        validation.validate_exp = true;
        validation.set_issuer(&[self.issuer.as_str()]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => CryptoError::TokenExpired,
                _ => CryptoError::InvalidToken(e.to_string()),
            })
    }

    /// Validate a token and extract the user ID from its subject
    pub fn user_id_from_token(&self, token: &str) -> Result<Uuid> {
        self.validate_token(token)?.user_id()
    }
}

// ============================================================================
// Tests
// ============================================================================
