use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Errors raised while wiring the dependency graph.
///
/// These are programming errors: they surface at startup, when routes are
/// registered, and never while serving requests.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InjectorError {
    /// No builder is registered for the requested type.
    #[error("builder not found for type {0}")]
    UnresolvedDependency(&'static str),

    /// A builder depends, directly or transitively, on its own output.
    #[error("dependency cycle detected: {path}")]
    DependencyCycle { path: String },

    /// The populate target exposes no injectable fields.
    #[error("value of type {0} cannot be populated: it exposes no injectable fields")]
    PopulateTargetInvalid(&'static str),

    /// A builder produced a value of a different type than it was keyed by.
    #[error("builder for type {0} produced a value of another type")]
    TypeMismatch(&'static str),
}

/// Errors raised by a [`Cypher`](crate::crypto::cypher::Cypher).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CypherError {
    /// The input is too short to carry a nonce, or is not valid framing.
    #[error("malformed AES256 encrypted data")]
    MalformedCiphertext,

    /// The AEAD tag did not verify: wrong key or tampered data.
    #[error("cannot decrypt AES256: authentication failed")]
    AuthenticationFailure,

    /// The key is not 32 bytes long.
    #[error("AES256 key must be 32 bytes long, got {0}")]
    InvalidKeyLength(usize),

    /// Sealing failed.
    #[error("cannot encrypt using AES256: {0}")]
    Encryption(String),
}

/// Errors raised by the session layer.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("no session entry for id '{0}'")]
    EntryNotFound(String),

    #[error("expired session")]
    ExpiredSession,

    #[error("invalid session cookie: {0}")]
    InvalidCookie(String),

    #[error("cannot encrypt session cookie: {0}")]
    Cypher(#[from] CypherError),

    #[error("session store error: {0}")]
    Store(#[from] redis::RedisError),

    #[error("session serialization error: {0}")]
    Serialization(String),
}

impl SessionError {
    /// Whether the failure only means "there is no authenticated session".
    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            SessionError::EntryNotFound(_)
                | SessionError::ExpiredSession
                | SessionError::InvalidCookie(_)
        )
    }
}

/// The application's error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// A session layer error.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// A cryptographic error.
    #[error("Cypher error: {0}")]
    Cypher(#[from] CypherError),

    /// A wiring error.
    #[error("Injector error: {0}")]
    Injector(#[from] InjectorError),

    /// An authentication error.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The principal lacks the required role.
    #[error("Authorization failed")]
    Unauthorized,

    /// The anti-forgery token is missing, expired or forged.
    #[error("CSRF check failed")]
    Csrf,

    /// A validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The request body exceeds the accepted size.
    #[error("Payload too large")]
    PayloadTooLarge,

    /// An encryption error.
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// An internal server error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Session(ref e) if e.is_unauthenticated() => {
                tracing::warn!("Session rejected: {}", e);
                (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
            }

            AppError::Session(ref e) => {
                tracing::error!("Session error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Session error".to_string())
            }

            AppError::Cypher(ref e) => {
                tracing::error!("Cypher error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Encryption error".to_string())
            }

            AppError::Injector(ref e) => {
                tracing::error!("Injector error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }

            AppError::Authentication(ref msg) => {
                tracing::warn!("Authentication failed: {}", msg);
                (StatusCode::UNAUTHORIZED, msg.clone())
            }

            AppError::Unauthorized => {
                tracing::warn!("Authorization failed");
                (StatusCode::FORBIDDEN, "Forbidden".to_string())
            }

            AppError::Csrf => {
                tracing::warn!("CSRF check failed");
                (StatusCode::FORBIDDEN, "Invalid CSRF token".to_string())
            }

            AppError::Validation(ref msg) => {
                tracing::debug!("Validation error: {}", msg);
                (StatusCode::BAD_REQUEST, msg.clone())
            }

            AppError::PayloadTooLarge => {
                tracing::debug!("Request body over the size limit");
                (StatusCode::PAYLOAD_TOO_LARGE, "Payload too large".to_string())
            }

            AppError::Encryption(ref msg) => {
                tracing::error!("Encryption error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Encryption error".to_string())
            }

            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = sonic_rs::to_string(&sonic_rs::json!({
            "error": message
        }))
        .unwrap_or_else(|_| r#"{"error":"Internal server error"}"#.to_string());

        (status, body).into_response()
    }
}
