//! reqwest-backed transport.

use std::path::Path;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use courier_core::HttpMethod;
use futures::StreamExt;
use reqwest::header::CONTENT_LENGTH;
use reqwest::{Client, Method};
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};

use super::{DispatchedRequest, Progress, ProgressHandler, Transport, TransportResponse};
use crate::error::TransportError;
use crate::request::SessionTier;
use crate::settings::ClientSettings;

/// Upload bodies are streamed in chunks of this size so progress can be reported.
const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

fn to_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Connect => Method::CONNECT,
        HttpMethod::Delete => Method::DELETE,
        HttpMethod::Get => Method::GET,
        HttpMethod::Head => Method::HEAD,
        HttpMethod::Options => Method::OPTIONS,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Trace => Method::TRACE,
    }
}

// ============================================================================
// Sessions
// ============================================================================

#[derive(Debug, Clone)]
struct Sessions {
    default: Client,
    background: Client,
    ephemeral: Client,
}

impl Sessions {
    fn build(timeout: Duration, user_agent: &str) -> Result<Self, TransportError> {
        let default = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;

        // Transfers can legitimately take longer than any request timeout.
        let background = Client::builder()
            .connect_timeout(timeout)
            .user_agent(user_agent)
            .build()?;

        let ephemeral = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .pool_max_idle_per_host(0)
            .build()?;

        Ok(Self {
            default,
            background,
            ephemeral,
        })
    }

    fn client(&self, tier: SessionTier) -> &Client {
        match tier {
            SessionTier::Default => &self.default,
            SessionTier::Background => &self.background,
            SessionTier::Ephemeral => &self.ephemeral,
        }
    }
}

// ============================================================================
// Reqwest Transport
// ============================================================================

/// [`Transport`] backed by `reqwest`, with one client per [`SessionTier`].
#[derive(Debug)]
pub struct ReqwestTransport {
    sessions: RwLock<Sessions>,
    timeout: Duration,
    user_agent: String,
}

impl ReqwestTransport {
    /// Creates a transport configured from `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Configuration`] if a client cannot be built,
    /// which usually means the TLS backend is unavailable.
    pub fn new(settings: &ClientSettings) -> Result<Self, TransportError> {
        let timeout = settings.timeout();
        let sessions = Sessions::build(timeout, &settings.user_agent)?;
        Ok(Self {
            sessions: RwLock::new(sessions),
            timeout,
            user_agent: settings.user_agent.clone(),
        })
    }

    fn client(&self, tier: SessionTier) -> Client {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .client(tier)
            .clone()
    }

    fn prepare(&self, request: DispatchedRequest) -> reqwest::RequestBuilder {
        let DispatchedRequest { tier, wire, .. } = request;
        let builder = self
            .client(tier)
            .request(to_method(wire.method), wire.url)
            .headers(wire.headers);
        match wire.body {
            Some(body) => builder.body(body),
            None => builder,
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    #[instrument(skip(self, request), fields(task_id = %request.task_id, url = %request.wire.url))]
    async fn send(&self, request: DispatchedRequest) -> Result<TransportResponse, TransportError> {
        debug!(method = %request.wire.method, tier = %request.tier, "Sending request");

        let response = self.prepare(request).send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let url = response.url().clone();
        let body = response.bytes().await?.to_vec();

        debug!(status, bytes = body.len(), "Received response");
        Ok(TransportResponse {
            status,
            headers,
            body,
            url,
        })
    }

    #[instrument(skip(self, request, payload, progress), fields(task_id = %request.task_id, url = %request.wire.url))]
    async fn upload(
        &self,
        request: DispatchedRequest,
        payload: Vec<u8>,
        progress: ProgressHandler,
    ) -> Result<TransportResponse, TransportError> {
        let total = payload.len() as u64;
        debug!(bytes = total, "Uploading");

        let chunks: Vec<Vec<u8>> = payload
            .chunks(UPLOAD_CHUNK_SIZE)
            .map(<[u8]>::to_vec)
            .collect();
        let mut sent = 0u64;
        let stream = futures::stream::iter(chunks.into_iter().map(move |chunk| {
            sent += chunk.len() as u64;
            progress(Progress::new(sent, Some(total)));
            Ok::<_, std::io::Error>(chunk)
        }));

        let response = self
            .prepare(request)
            .header(CONTENT_LENGTH, total)
            .body(reqwest::Body::wrap_stream(stream))
            .send()
            .await?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let url = response.url().clone();
        let body = response.bytes().await?.to_vec();

        Ok(TransportResponse {
            status,
            headers,
            body,
            url,
        })
    }

    #[instrument(skip(self, request, progress), fields(task_id = %request.task_id, url = %request.wire.url))]
    async fn download(
        &self,
        request: DispatchedRequest,
        destination: &Path,
        progress: ProgressHandler,
    ) -> Result<TransportResponse, TransportError> {
        let response = self.prepare(request).send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let url = response.url().clone();
        let total = response.content_length();

        let mut file = tokio::fs::File::create(destination).await?;
        let mut received = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            received += chunk.len() as u64;
            progress(Progress::new(received, total));
        }
        file.flush().await?;

        debug!(bytes = received, destination = %destination.display(), "Download finished");
        Ok(TransportResponse {
            status,
            headers,
            body: Vec::new(),
            url,
        })
    }

    fn reset(&self) {
        match Sessions::build(self.timeout, &self.user_agent) {
            Ok(sessions) => {
                *self.sessions.write().unwrap_or_else(PoisonError::into_inner) = sessions;
                debug!("Transport sessions rebuilt");
            }
            Err(e) => warn!(error = %e, "Failed to rebuild transport sessions, keeping the old ones"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_mapping() {
        for method in HttpMethod::all() {
            assert_eq!(to_method(*method).as_str(), method.as_str());
        }
    }
}
