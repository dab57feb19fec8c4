//! Client error types.

use courier_core::{AuthError, BodyError};
use thiserror::Error;

// ============================================================================
// Request Error
// ============================================================================

/// Error delivered to a request's completion.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The base URL cannot have paths joined onto it.
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),

    /// The resolved URL is not valid.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// A header name or value is not valid HTTP.
    #[error("Invalid header {name}: {reason}")]
    InvalidHeader {
        /// The offending header name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The body could not be encoded.
    #[error("Invalid body: {0}")]
    InvalidBody(#[from] BodyError),

    /// The transport failed before a response arrived.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The server answered with a status of 400 or above.
    #[error("HTTP {status}: {reason}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Human-readable reason.
        reason: String,
    },

    /// Refreshing or obtaining the credential failed.
    #[error("Authentication failed: {0}")]
    Authentication(#[from] AuthError),

    /// The request was cancelled before it was dispatched.
    #[error("Request cancelled")]
    Cancelled,

    /// No authenticator is configured.
    #[error("No authenticator configured")]
    NoAuthenticator,

    /// The credential could not be persisted or loaded.
    #[error("Credential store error: {0}")]
    Store(#[from] courier_store::StoreError),

    /// No tokio runtime is available to drive requests.
    #[error("No async runtime available: {0}")]
    NoRuntime(String),

    /// The controller was dropped before the request completed.
    #[error("Request controller was dropped")]
    ControllerDropped,

    /// Local I/O failed (reading an upload, preparing a download).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RequestError {
    /// Returns the HTTP status code for status errors.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns true for errors raised while building the request.
    ///
    /// These are never worth retrying because the same request fails the same way.
    pub fn is_construction(&self) -> bool {
        matches!(
            self,
            Self::InvalidBaseUrl(_)
                | Self::InvalidUrl(_)
                | Self::InvalidHeader { .. }
                | Self::InvalidBody(_)
        )
    }

    /// Returns true if the request was cancelled, in flight or while queued.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Cancelled | Self::Transport(TransportError::Cancelled)
        )
    }

    /// Returns true if the failure came from the network or the server.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Status { .. })
    }
}

// ============================================================================
// Transport Error
// ============================================================================

/// Error raised by a [`Transport`](crate::transport::Transport).
#[derive(Debug, Error)]
pub enum TransportError {
    /// The connection could not be made or was lost.
    #[error("Network error: {0}")]
    Network(String),

    /// The request timed out.
    #[error("Request timed out")]
    Timeout,

    /// The task was cancelled.
    #[error("Request cancelled")]
    Cancelled,

    /// The transport could not be configured.
    #[error("Transport configuration error: {0}")]
    Configuration(String),

    /// Local I/O failed while streaming a transfer.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything else.
    #[error("Transport error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() || err.is_request() {
            Self::Network(err.to_string())
        } else if err.is_builder() {
            Self::Configuration(err.to_string())
        } else {
            Self::Other(err.to_string())
        }
    }
}
