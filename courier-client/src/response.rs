//! Typed responses and the rules that classify them.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use courier_core::{StatusClass, reason_phrase};
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use url::Url;

use crate::error::{RequestError, TransportError};
use crate::transport::TransportResponse;

// ============================================================================
// Response
// ============================================================================

/// A response received from the server.
///
/// Text and JSON views are decoded on first access and cached.
#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    headers: HeaderMap,
    data: Vec<u8>,
    url: Url,
    redirected_from: Option<Url>,
    json: OnceLock<Option<Value>>,
}

impl Response {
    /// Creates a response.
    pub fn new(status: u16, headers: HeaderMap, data: Vec<u8>, url: Url) -> Self {
        Self {
            status,
            headers,
            data,
            url,
            redirected_from: None,
            json: OnceLock::new(),
        }
    }

    /// Records the URL originally requested before redirects were followed.
    #[must_use]
    pub fn with_redirected_from(mut self, original: Url) -> Self {
        self.redirected_from = Some(original);
        self
    }

    /// The HTTP status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// The semantic class of the status code.
    pub fn status_class(&self) -> StatusClass {
        StatusClass::from_code(self.status)
    }

    /// Returns true if the response is considered an error (status of 400 or above).
    pub fn is_error(&self) -> bool {
        self.status >= 400
    }

    /// The canonical reason phrase for the status code.
    pub fn reason(&self) -> String {
        reason_phrase(self.status).map_or_else(|| format!("Status {}", self.status), str::to_string)
    }

    /// Response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns a header value as a string.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The raw body.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the response, returning the raw body.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// The final URL, after redirects.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The URL originally requested, when the transport followed a redirect.
    pub fn redirected_from(&self) -> Option<&Url> {
        self.redirected_from.as_ref()
    }

    /// The body decoded as UTF-8.
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }

    /// Deserializes the body.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.data)
    }

    /// The body as a JSON value, if it parses.
    pub fn json_value(&self) -> Option<&Value> {
        self.json
            .get_or_init(|| serde_json::from_slice(&self.data).ok())
            .as_ref()
    }

    /// The body as a JSON object.
    pub fn dictionary(&self) -> Option<&Map<String, Value>> {
        self.json_value().and_then(Value::as_object)
    }

    /// The body as a JSON array.
    pub fn array(&self) -> Option<&Vec<Value>> {
        self.json_value().and_then(Value::as_array)
    }
}

// ============================================================================
// Download
// ============================================================================

/// A completed download.
#[derive(Debug, Clone)]
pub struct Download {
    /// Response headers and status. The body is empty; the bytes are on disk.
    pub response: Response,
    /// Where the downloaded file was written.
    pub location: PathBuf,
}

impl Download {
    /// Path of the downloaded file.
    pub fn location(&self) -> &Path {
        &self.location
    }
}

// ============================================================================
// Interpretation
// ============================================================================

/// Turns a transport result into a response or a classified error.
///
/// A status of 400 or above is an error even though the transport succeeded;
/// the response stays attached so callers can inspect the body.
pub(crate) fn interpret(
    requested: &Url,
    outcome: Result<TransportResponse, TransportError>,
) -> Result<Response, (RequestError, Option<Response>)> {
    let raw = outcome.map_err(|e| (RequestError::Transport(e), None))?;

    let mut response = Response::new(raw.status, raw.headers, raw.body, raw.url);
    if response.url() != requested {
        response = response.with_redirected_from(requested.clone());
    }

    if response.is_error() {
        let error = RequestError::Status {
            status: response.status(),
            reason: response.reason(),
        };
        return Err((error, Some(response)));
    }

    Ok(response)
}
