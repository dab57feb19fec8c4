//! HTTP method and status types.
//!
//! This module contains the protocol-level vocabulary shared by requests and responses:
//! - [`HttpMethod`] - Request methods
//! - [`StatusClass`] - Semantic classification of status codes

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ============================================================================
// HTTP Method
// ============================================================================

/// HTTP request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// Establishes a tunnel to the target server.
    Connect,
    /// Deletes the target resource.
    Delete,
    /// Retrieves a representation of the target resource.
    #[default]
    Get,
    /// Like GET without the response body.
    Head,
    /// Describes communication options for the target resource.
    Options,
    /// Applies partial modifications.
    Patch,
    /// Submits an entity to the target resource.
    Post,
    /// Replaces the target resource.
    Put,
    /// Performs a message loop-back test.
    Trace,
}

impl HttpMethod {
    /// Returns the wire name of the method.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Delete => "DELETE",
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Patch => "PATCH",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Trace => "TRACE",
        }
    }

    /// Returns false for methods that must never carry a body.
    pub fn allows_body(&self) -> bool {
        !matches!(self, Self::Get)
    }

    /// Returns all methods.
    pub fn all() -> &'static [HttpMethod] {
        &[
            Self::Connect,
            Self::Delete,
            Self::Get,
            Self::Head,
            Self::Options,
            Self::Patch,
            Self::Post,
            Self::Put,
            Self::Trace,
        ]
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .find(|method| method.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| CoreError::UnknownMethod(s.to_string()))
    }
}

// ============================================================================
// Status Class
// ============================================================================

/// Semantic classification of an HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    /// 1xx.
    Informational,
    /// 2xx.
    Success,
    /// 3xx.
    Redirection,
    /// 4xx.
    ClientError,
    /// 5xx.
    ServerError,
    /// Anything outside 100..=599.
    Unknown,
}

impl StatusClass {
    /// Classifies a status code.
    pub fn from_code(code: u16) -> Self {
        match code {
            100..=199 => Self::Informational,
            200..=299 => Self::Success,
            300..=399 => Self::Redirection,
            400..=499 => Self::ClientError,
            500..=599 => Self::ServerError,
            _ => Self::Unknown,
        }
    }

    /// Returns true if a status in this class is considered an error.
    ///
    /// Codes of 400 and above (including out-of-range codes) are errors.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::ClientError | Self::ServerError | Self::Unknown)
    }
}

/// Returns the canonical reason phrase for a status code.
pub fn reason_phrase(code: u16) -> Option<&'static str> {
    let phrase = match code {
        100 => "Continue",
        101 => "Switching Protocols",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        203 => "Non-Authoritative Information",
        204 => "No Content",
        205 => "Reset Content",
        206 => "Partial Content",
        300 => "Multiple Choices",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        305 => "Use Proxy",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        402 => "Payment Required",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        407 => "Proxy Authentication Required",
        408 => "Request Timeout",
        409 => "Conflict",
        410 => "Gone",
        411 => "Length Required",
        412 => "Precondition Failed",
        413 => "Request Entity Too Large",
        414 => "Request-URI Too Long",
        415 => "Unsupported Media Type",
        416 => "Range Not Satisfiable",
        417 => "Expectation Failed",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        505 => "HTTP Version Not Supported",
        _ => return None,
    };
    Some(phrase)
}

// ============================================================================
// Tests
// ============================================================================
