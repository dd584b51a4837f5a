/// Error types for the LearningPulse gateway
///
/// Every failure a resolver or REST handler can produce is a [`GatewayError`].
/// GraphQL responses carry a machine-readable `code` extension; REST responses
/// map the same variants onto HTTP status codes.
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use async_graphql::ErrorExtensions;
use thiserror::Error;
use tracing::error;

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Authentication required")]
    Unauthenticated,

    /// Login failures keep their specific message ("User not found", "Invalid password")
    #[error("{0}")]
    InvalidCredentials(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    /// Details are logged, never returned to clients
    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("Failed to send email: {0}")]
    Email(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn not_found(what: &str) -> Self {
        GatewayError::NotFound(format!("{what} not found"))
    }

    /// GraphQL `extensions.code` value
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::Unauthenticated | GatewayError::InvalidCredentials(_) => {
                "UNAUTHENTICATED"
            }
            GatewayError::Forbidden(_) => "FORBIDDEN",
            GatewayError::NotFound(_) => "NOT_FOUND",
            GatewayError::Validation(_) => "BAD_USER_INPUT",
            GatewayError::Conflict(_) => "CONFLICT",
            GatewayError::Database(_) | GatewayError::Email(_) | GatewayError::Internal(_) => {
                "INTERNAL_SERVER_ERROR"
            }
        }
    }
}

impl ErrorExtensions for GatewayError {
    fn extend(&self) -> async_graphql::Error {
        if let GatewayError::Database(e) = self {
            error!(error = %e, "database operation failed");
        }

        let code = self.code();
        async_graphql::Error::new(self.to_string()).extend_with(|_, ext| ext.set("code", code))
    }
}

impl ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Unauthenticated | GatewayError::InvalidCredentials(_) => {
                StatusCode::UNAUTHORIZED
            }
            GatewayError::Forbidden(_) => StatusCode::FORBIDDEN,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::Conflict(_) => StatusCode::CONFLICT,
            GatewayError::Database(_) | GatewayError::Email(_) | GatewayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let GatewayError::Database(e) = self {
            error!(error = %e, "database operation failed");
        }

        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.to_string(),
        }))
    }
}

impl From<crypto_core::CryptoError> for GatewayError {
    fn from(err: crypto_core::CryptoError) -> Self {
        GatewayError::Internal(err.to_string())
    }
}
