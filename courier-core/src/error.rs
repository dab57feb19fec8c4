//! Core error types for Courier.

use thiserror::Error;

/// Core error type for model operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Stored credential bytes could not be decoded.
    #[error("Invalid credential data: {0}")]
    InvalidCredential(String),

    /// Unknown HTTP method name.
    #[error("Unknown HTTP method: {0}")]
    UnknownMethod(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Error raised when a request body cannot be encoded.
#[derive(Debug, Error)]
pub enum BodyError {
    /// The body value cannot be represented in the declared content type.
    #[error("Invalid body for content type {content_type}: {reason}")]
    InvalidForContentType {
        /// The content type the body was declared as.
        content_type: String,
        /// Why encoding failed.
        reason: String,
    },

    /// JSON encoding failed.
    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Reading body contents failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error returned by an [`Authenticator`](crate::Authenticator).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The authority rejected the credential.
    #[error("Authentication rejected: {0}")]
    Rejected(String),

    /// A refresh was requested but the credential carries no refresh token.
    #[error("Credential has no refresh token")]
    MissingRefreshToken,

    /// The authentication exchange itself failed.
    #[error("Authentication failed: {0}")]
    Failed(String),
}
