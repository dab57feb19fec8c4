//! Recording transport for tests.
//!
//! Responses are picked by URL path first, then from a FIFO queue, then from
//! the default. Every request is recorded before it is answered.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use super::{DispatchedRequest, Progress, ProgressHandler, Transport, TransportResponse};
use crate::error::TransportError;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A canned response.
#[derive(Debug, Clone, Default)]
pub struct MockResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: Vec<(String, String)>,
    /// Response body.
    pub body: Vec<u8>,
}

impl MockResponse {
    /// A response with a status and an empty body.
    pub fn status(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// A response with a JSON body.
    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self {
            status,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: body.to_string().into_bytes(),
        }
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    fn header_map(&self) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                map.append(name, value);
            }
        }
        map
    }
}

/// [`Transport`] that answers from canned responses and records every request.
#[derive(Debug, Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<String, MockResponse>>,
    queue: Mutex<VecDeque<MockResponse>>,
    default_response: Mutex<Option<MockResponse>>,
    history: Mutex<Vec<DispatchedRequest>>,
    latency: Mutex<Option<Duration>>,
    resets: AtomicUsize,
}

impl MockTransport {
    /// Creates a transport with no responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport answering every request with `response`.
    pub fn always(response: MockResponse) -> Self {
        let transport = Self::new();
        transport.set_default_response(response);
        transport
    }

    /// Answers requests whose URL path equals `path`.
    pub fn route(&self, path: impl Into<String>, response: MockResponse) -> &Self {
        lock(&self.routes).insert(path.into(), response);
        self
    }

    /// Queues a response for the next unrouted request.
    pub fn queue_response(&self, response: MockResponse) -> &Self {
        lock(&self.queue).push_back(response);
        self
    }

    /// Sets the response used when nothing else matches.
    pub fn set_default_response(&self, response: MockResponse) -> &Self {
        *lock(&self.default_response) = Some(response);
        self
    }

    /// Delays every answer, keeping requests in flight.
    pub fn set_latency(&self, latency: Duration) -> &Self {
        *lock(&self.latency) = Some(latency);
        self
    }

    /// Returns every request received so far.
    pub fn requests(&self) -> Vec<DispatchedRequest> {
        lock(&self.history).clone()
    }

    /// Returns the most recent request.
    pub fn last_request(&self) -> Option<DispatchedRequest> {
        lock(&self.history).last().cloned()
    }

    /// Returns the URL paths requested, in arrival order.
    pub fn requested_paths(&self) -> Vec<String> {
        lock(&self.history)
            .iter()
            .map(|r| r.wire.url.path().to_string())
            .collect()
    }

    /// Returns how many times the transport was reset.
    pub fn reset_count(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    async fn answer(&self, request: DispatchedRequest) -> Result<TransportResponse, TransportError> {
        let url = request.wire.url.clone();
        lock(&self.history).push(request);

        let latency = *lock(&self.latency);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let routed = lock(&self.routes).get(url.path()).cloned();
        let response = routed
            .or_else(|| lock(&self.queue).pop_front())
            .or_else(|| lock(&self.default_response).clone())
            .ok_or_else(|| TransportError::Network("No mock response available".to_string()))?;

        Ok(TransportResponse {
            status: response.status,
            headers: response.header_map(),
            body: response.body,
            url,
        })
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: DispatchedRequest) -> Result<TransportResponse, TransportError> {
        self.answer(request).await
    }

    async fn upload(
        &self,
        request: DispatchedRequest,
        payload: Vec<u8>,
        progress: ProgressHandler,
    ) -> Result<TransportResponse, TransportError> {
        let mut request = request;
        let total = payload.len() as u64;
        request.wire.body = Some(payload);
        let response = self.answer(request).await?;
        progress(Progress::new(total, Some(total)));
        Ok(response)
    }

    async fn download(
        &self,
        request: DispatchedRequest,
        destination: &Path,
        progress: ProgressHandler,
    ) -> Result<TransportResponse, TransportError> {
        let mut response = self.answer(request).await?;
        let body = std::mem::take(&mut response.body);
        tokio::fs::write(destination, &body).await?;

        let total = body.len() as u64;
        progress(Progress::new(total, Some(total)));
        Ok(response)
    }

    fn reset(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}
