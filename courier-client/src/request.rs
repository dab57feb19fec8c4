//! Request descriptions and their rendering into wire requests.
//!
//! A [`Request`] is immutable once built. It is rendered into a [`WireRequest`]
//! each time it is dispatched, so retrying a request renders it again.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use courier_core::{HttpMethod, RequestBody};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use tracing::error;
use url::Url;

use crate::error::RequestError;

/// Header map where a `None` value explicitly unsets the header.
pub type Headers = BTreeMap<String, Option<String>>;

/// Returns the value of a header, comparing names case-insensitively.
pub(crate) fn header_value<'a>(headers: &'a Headers, name: &str) -> Option<&'a Option<String>> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value)
}

/// Ensures the base URL path ends with `/` so relative paths append to it.
pub fn normalize_base_url(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

// ============================================================================
// Session Tier
// ============================================================================

/// Transport configuration a request runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionTier {
    /// Regular requests.
    #[default]
    Default,
    /// Long-running transfers.
    Background,
    /// Requests that must not share connections or cookies.
    Ephemeral,
}

impl SessionTier {
    /// Returns all tiers.
    pub fn all() -> &'static [SessionTier] {
        &[Self::Default, Self::Background, Self::Ephemeral]
    }
}

impl fmt::Display for SessionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Default => "default",
            Self::Background => "background",
            Self::Ephemeral => "ephemeral",
        })
    }
}

// ============================================================================
// Request
// ============================================================================

/// Description of one HTTP call.
#[derive(Debug, Clone)]
pub struct Request {
    base_url: Url,
    path: Option<String>,
    method: HttpMethod,
    headers: Headers,
    body: Option<Arc<dyn RequestBody>>,
    content_type: Option<String>,
    query: Vec<(String, String)>,
    tag: Option<u64>,
    tier: SessionTier,
}

impl Request {
    /// Starts building a request against `base_url`.
    pub fn builder(base_url: Url, method: HttpMethod) -> RequestBuilder {
        RequestBuilder {
            request: Self {
                base_url: normalize_base_url(base_url),
                path: None,
                method,
                headers: Headers::new(),
                body: None,
                content_type: None,
                query: Vec::new(),
                tag: None,
                tier: SessionTier::Default,
            },
        }
    }

    /// Returns a builder seeded with this request.
    pub fn to_builder(&self) -> RequestBuilder {
        RequestBuilder {
            request: self.clone(),
        }
    }

    /// The base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The path appended to the base URL.
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// The HTTP method.
    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// The configured headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// The body, if any.
    pub fn body(&self) -> Option<&Arc<dyn RequestBody>> {
        self.body.as_ref()
    }

    /// The content type override.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Query items appended to the URL.
    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    /// The cancellation tag.
    pub fn tag(&self) -> Option<u64> {
        self.tag
    }

    /// The session tier.
    pub fn tier(&self) -> SessionTier {
        self.tier
    }

    /// Returns true if the header is configured, with a value or explicitly unset.
    pub fn has_header(&self, name: &str) -> bool {
        header_value(&self.headers, name).is_some()
    }

    /// Returns a copy with `defaults` added where the request has no such header.
    ///
    /// `Content-Type` is never inherited by GET requests.
    #[must_use]
    pub fn with_default_headers(&self, defaults: &Headers) -> Self {
        let mut request = self.clone();
        for (name, value) in defaults {
            if request.has_header(name) {
                continue;
            }
            if request.method == HttpMethod::Get && name.eq_ignore_ascii_case(CONTENT_TYPE.as_str())
            {
                continue;
            }
            request.headers.insert(name.clone(), value.clone());
        }
        request
    }

    /// Returns a copy with a header added unless the request already configures it.
    #[must_use]
    pub(crate) fn with_header_if_missing(&self, name: &str, value: String) -> Self {
        if self.has_header(name) {
            return self.clone();
        }
        let mut request = self.clone();
        request.headers.insert(name.to_string(), Some(value));
        request
    }

    /// Resolves the absolute URL from base, path and query items.
    ///
    /// A query string in the path is appended to any query already on the base
    /// URL, and query items come last.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::InvalidBaseUrl`] if the base cannot take a path and
    /// [`RequestError::InvalidUrl`] if the path is itself an absolute URL.
    pub fn url(&self) -> Result<Url, RequestError> {
        if self.base_url.cannot_be_a_base() {
            return Err(RequestError::InvalidBaseUrl(self.base_url.to_string()));
        }

        let mut url = self.base_url.clone();

        if let Some(path) = self.path.as_deref().filter(|p| !p.is_empty()) {
            if path.contains("://") {
                return Err(RequestError::InvalidUrl(path.to_string()));
            }

            let (path, query) = match path.split_once('?') {
                Some((path, query)) => (path, Some(query)),
                None => (path, None),
            };
            let joined = format!("{}{}", url.path(), path.trim_start_matches('/'));
            url.set_path(&joined);
            if let Some(query) = query.filter(|q| !q.is_empty()) {
                let merged = match url.query().filter(|q| !q.is_empty()) {
                    Some(existing) => format!("{existing}&{query}"),
                    None => query.to_string(),
                };
                url.set_query(Some(&merged));
            }
        }

        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&self.query);
        }

        Ok(url)
    }

    /// Renders the request into a wire request.
    ///
    /// # Errors
    ///
    /// Fails when the URL cannot be resolved, a header is not valid HTTP, or the
    /// body cannot be encoded.
    pub fn construct(&self) -> Result<WireRequest, RequestError> {
        let url = self.url()?;
        let mut headers = HeaderMap::new();
        let mut body = None;

        if let Some(encoder) = &self.body {
            if self.method.allows_body() {
                let bytes = encoder.payload()?;
                if !bytes.is_empty() {
                    if let Some(content_type) = self.content_type.clone().or_else(|| encoder.content_type()) {
                        headers.insert(CONTENT_TYPE, parse_value(CONTENT_TYPE.as_str(), &content_type)?);
                    }
                    body = Some(bytes);
                }
            } else {
                error!(
                    url = %url,
                    "Invalid request: GET requests must not carry a body, dropping it"
                );
            }
        }

        for (name, value) in &self.headers {
            let header = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                RequestError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                }
            })?;

            if self.method == HttpMethod::Get && header == CONTENT_TYPE {
                continue;
            }

            match value {
                Some(value) => {
                    headers.insert(header, parse_value(name, value)?);
                }
                None => {
                    headers.remove(header);
                }
            }
        }

        Ok(WireRequest {
            method: self.method,
            url,
            headers,
            body,
        })
    }
}

fn parse_value(name: &str, value: &str) -> Result<HeaderValue, RequestError> {
    HeaderValue::from_str(value).map_err(|e| RequestError::InvalidHeader {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

// ============================================================================
// Request Builder
// ============================================================================

/// Builder for [`Request`].
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    request: Request,
}

impl RequestBuilder {
    /// Sets the path appended to the base URL.
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.request.path = Some(path.into());
        self
    }

    /// Replaces the base URL for this request only.
    #[must_use]
    pub fn base_url(mut self, base_url: Url) -> Self {
        self.request.base_url = normalize_base_url(base_url);
        self
    }

    /// Sets the HTTP method.
    #[must_use]
    pub fn method(mut self, method: HttpMethod) -> Self {
        self.request.method = method;
        self
    }

    /// Sets a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.headers.insert(name.into(), Some(value.into()));
        self
    }

    /// Explicitly unsets a header, overriding defaults.
    #[must_use]
    pub fn unset_header(mut self, name: impl Into<String>) -> Self {
        self.request.headers.insert(name.into(), None);
        self
    }

    /// Merges a header map into the request.
    #[must_use]
    pub fn headers(mut self, headers: Headers) -> Self {
        self.request.headers.extend(headers);
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn body(self, body: impl RequestBody + 'static) -> Self {
        self.shared_body(Arc::new(body))
    }

    /// Sets an already shared body.
    #[must_use]
    pub fn shared_body(mut self, body: Arc<dyn RequestBody>) -> Self {
        self.request.body = Some(body);
        self
    }

    /// Overrides the body's content type.
    #[must_use]
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.request.content_type = Some(content_type.into());
        self
    }

    /// Appends a query item.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.query.push((key.into(), value.into()));
        self
    }

    /// Sets the cancellation tag.
    #[must_use]
    pub fn tag(mut self, tag: u64) -> Self {
        self.request.tag = Some(tag);
        self
    }

    /// Sets the session tier.
    #[must_use]
    pub fn tier(mut self, tier: SessionTier) -> Self {
        self.request.tier = tier;
        self
    }

    /// Finishes the request.
    pub fn build(self) -> Request {
        self.request
    }
}

// ============================================================================
// Wire Request
// ============================================================================

/// A fully resolved request, ready for the transport.
#[derive(Debug, Clone)]
pub struct WireRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Absolute URL.
    pub url: Url,
    /// Final headers.
    pub headers: HeaderMap,
    /// Encoded body.
    pub body: Option<Vec<u8>>,
}
