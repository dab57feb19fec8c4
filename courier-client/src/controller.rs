//! The request controller.
//!
//! One controller is shared per API endpoint. Every request goes through the
//! same path:
//!
//! 1. activity starts and default headers are merged in;
//! 2. the [`AuthGate`] decides whether the request proceeds, waits for a
//!    refresh in flight, or drives a refresh itself;
//! 3. the request is rendered, registered as a task and handed to the
//!    [`Transport`];
//! 4. the result is classified, observers are told, activity ends and the
//!    completion is queued on the [`CallbackQueue`].

use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use courier_core::{Authenticator, Credential, HttpMethod, RequestBody};
use courier_store::{CredentialStore, StoreError};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::body::sniff_content_type;
use crate::callback::CallbackQueue;
use crate::error::{RequestError, TransportError};
use crate::gate::{AuthCheck, AuthGate};
use crate::job::{Completion, DownloadCompletion, Job, JobKind, UploadSource};
use crate::observer::{ActivityCounter, ActivityObserver, RequestObserver};
use crate::recovery::{RequestFailure, Rescheduler};
use crate::request::{Headers, Request, RequestBuilder, SessionTier, normalize_base_url};
use crate::response::{Download, Response, interpret};
use crate::settings::ClientSettings;
use crate::tasks::TaskRegistry;
use crate::transport::{DispatchedRequest, ProgressHandler, ReqwestTransport, TaskId, Transport, TransportResponse};

/// Prefix of the identifier a controller stores its credential under when no
/// authenticator supplies one.
pub const CREDENTIAL_NAMESPACE: &str = "courier";

/// Returns the identifier used for credentials of a controller at `base_url`.
pub fn default_credential_identifier(base_url: &Url) -> String {
    format!("{CREDENTIAL_NAMESPACE}-{base_url}")
}

fn download_destination() -> std::io::Result<PathBuf> {
    tempfile::Builder::new()
        .prefix("courier-download-")
        .tempfile()?
        .into_temp_path()
        .keep()
        .map_err(|e| e.error)
}

// ============================================================================
// Request Options
// ============================================================================

/// Optional parts of a request made through [`RequestController::request`].
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Request body.
    pub body: Option<Arc<dyn RequestBody>>,
    /// Cancellation tag.
    pub tag: Option<u64>,
    /// Overrides the body's content type.
    pub content_type: Option<String>,
    /// Replaces the controller's base URL for this request.
    pub base_url: Option<Url>,
    /// Query items.
    pub query: Vec<(String, String)>,
    /// Extra headers.
    pub headers: Headers,
    /// Session tier.
    pub tier: SessionTier,
}

impl RequestOptions {
    /// No options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the body.
    #[must_use]
    pub fn body(mut self, body: impl RequestBody + 'static) -> Self {
        self.body = Some(Arc::new(body));
        self
    }

    /// Sets the cancellation tag.
    #[must_use]
    pub fn tag(mut self, tag: u64) -> Self {
        self.tag = Some(tag);
        self
    }

    /// Overrides the content type.
    #[must_use]
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Overrides the base URL.
    #[must_use]
    pub fn base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Appends a query item.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Sets a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), Some(value.into()));
        self
    }

    /// Sets the session tier.
    #[must_use]
    pub fn tier(mut self, tier: SessionTier) -> Self {
        self.tier = tier;
        self
    }

    fn apply(self, mut builder: RequestBuilder) -> RequestBuilder {
        if let Some(base_url) = self.base_url {
            builder = builder.base_url(base_url);
        }
        if let Some(body) = self.body {
            builder = builder.shared_body(body);
        }
        if let Some(tag) = self.tag {
            builder = builder.tag(tag);
        }
        if let Some(content_type) = self.content_type {
            builder = builder.content_type(content_type);
        }
        for (key, value) in self.query {
            builder = builder.query(key, value);
        }
        builder.headers(self.headers).tier(self.tier)
    }
}

// ============================================================================
// Shared State
// ============================================================================

struct Shared {
    base_url: Url,
    settings: ClientSettings,
    default_headers: RwLock<Headers>,
    gate: AuthGate<Job>,
    transport: Arc<dyn Transport>,
    tasks: TaskRegistry,
    callbacks: CallbackQueue,
    activity: Arc<dyn ActivityObserver>,
    observers: RwLock<Vec<Arc<dyn RequestObserver>>>,
    runtime: Handle,
    weak_self: Weak<Shared>,
}

impl Shared {
    fn default_headers(&self) -> Headers {
        self.default_headers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// True in synchronous mode when called from outside the runtime.
    fn blocks_caller(&self) -> bool {
        self.settings.synchronous && Handle::try_current().is_err()
    }

    /// Runs `future` on the runtime, blocking the caller when [`Self::blocks_caller`].
    fn launch<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.blocks_caller() {
            self.runtime.block_on(future);
        } else {
            self.runtime.spawn(future);
        }
    }

    /// Public entry point: counts activity once, then submits.
    ///
    /// A blocking caller whose job is queued behind a refresh waits for the
    /// job's completion.
    fn schedule(self: &Arc<Self>, job: Job) {
        self.activity.activity_started();
        let defaults = self.default_headers();
        let job = job.map_request(|request| request.with_default_headers(&defaults));

        debug!(
            kind = job.kind_name(),
            method = %job.request.method(),
            path = job.request.path().unwrap_or_default(),
            tag = ?job.request.tag(),
            "Scheduling request"
        );

        if !self.blocks_caller() {
            self.submit(job);
            return;
        }

        let (done, finished) = oneshot::channel();
        if self.submit(job.signal_when_done(done)) {
            debug!("Blocking until queued request completes");
            let _ = self.runtime.block_on(finished);
        }
    }

    /// Passes a job through the auth gate. Used for first submission and for
    /// jobs released after a refresh. Returns true if the job was queued.
    fn submit(self: &Arc<Self>, job: Job) -> bool {
        match self.gate.check(job) {
            AuthCheck::Proceed(job) => self.dispatch(job),
            AuthCheck::Queued => return true,
            AuthCheck::Refresh {
                entry,
                authenticator,
                credential,
            } => self.refresh(entry, authenticator, credential),
        }
        false
    }

    fn refresh(self: &Arc<Self>, job: Job, authenticator: Arc<dyn Authenticator>, credential: Credential) {
        let shared = Arc::clone(self);
        self.launch(async move {
            let outcome = authenticator.re_authenticate(&credential).await;
            let released = shared.gate.finish_refresh(authenticator.as_ref(), &outcome);

            let initiator = match outcome {
                Ok(_) if shared.settings.synchronous => {
                    let task = shared.register(&job);
                    Some((job, task))
                }
                Ok(_) => {
                    shared.dispatch(job);
                    None
                }
                Err(e) => {
                    shared.abort(job, RequestError::Authentication(e));
                    None
                }
            };

            for job in released {
                shared.submit(job);
            }

            // A blocked synchronous caller waits for its own request only.
            if let Some((job, task)) = initiator {
                shared.perform(job, task).await;
            }
        });
    }

    /// Registers the job as a task, then runs it. The task is cancellable as
    /// soon as this returns.
    fn dispatch(self: &Arc<Self>, job: Job) {
        let task = self.register(&job);
        let shared = Arc::clone(self);
        self.launch(async move { shared.perform(job, task).await });
    }

    fn register(&self, job: &Job) -> (TaskId, CancellationToken) {
        self.tasks.register(job.request.tag(), job.tier(), job.progress())
    }

    /// Adds the `Authorization` header derived from the shared credential.
    fn authorize(&self, request: &Request) -> Request {
        match self
            .gate
            .credential()
            .and_then(|credential| credential.authorization_header())
        {
            Some(header) => request.with_header_if_missing("Authorization", header),
            None => request.clone(),
        }
    }

    async fn perform(self: Arc<Self>, job: Job, (task_id, token): (TaskId, CancellationToken)) {
        let wire = match self.authorize(&job.request).construct() {
            Ok(wire) => wire,
            Err(e) => {
                warn!(error = %e, path = job.request.path().unwrap_or_default(), "Failed to construct request");
                self.tasks.finish(task_id);
                self.abort(job, e);
                return;
            }
        };

        let requested = wire.url.clone();
        let tier = job.tier();
        debug!(task_id = %task_id, tier = %tier, url = %requested, "Dispatching request");

        let request = DispatchedRequest { task_id, tier, wire };
        let outcome = tokio::select! {
            biased;
            () = token.cancelled() => Err(TransportError::Cancelled),
            outcome = self.execute(&job, request) => outcome,
        };

        self.tasks.finish(task_id);
        self.complete(job, &requested, outcome);
    }

    async fn execute(
        self: &Arc<Self>,
        job: &Job,
        request: DispatchedRequest,
    ) -> Result<(TransportResponse, Option<PathBuf>), TransportError> {
        let task_id = request.task_id;
        match &job.kind {
            JobKind::Data { .. } => Ok((self.transport.send(request).await?, None)),
            JobKind::Upload { source, .. } => {
                let payload = match source {
                    UploadSource::Data(bytes) => bytes.as_ref().clone(),
                    UploadSource::File(path) => tokio::fs::read(path).await?,
                };
                let response = self
                    .transport
                    .upload(request, payload, self.progress_sink(task_id))
                    .await?;
                Ok((response, None))
            }
            JobKind::Download { .. } => {
                let destination = download_destination()?;
                match self
                    .transport
                    .download(request, &destination, self.progress_sink(task_id))
                    .await
                {
                    Ok(response) => Ok((response, Some(destination))),
                    Err(e) => {
                        let _ = tokio::fs::remove_file(&destination).await;
                        Err(e)
                    }
                }
            }
        }
    }

    /// Progress forwarder that stops once the task leaves the registry.
    fn progress_sink(self: &Arc<Self>, task_id: TaskId) -> ProgressHandler {
        let weak = Arc::downgrade(self);
        Arc::new(move |progress| {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            if let Some(handler) = shared.tasks.progress_handler(task_id) {
                shared.callbacks.dispatch(move || handler(progress));
            }
        })
    }

    fn complete(
        &self,
        job: Job,
        requested: &Url,
        outcome: Result<(TransportResponse, Option<PathBuf>), TransportError>,
    ) {
        let (outcome, location) = match outcome {
            Ok((response, location)) => (Ok(response), location),
            Err(e) => (Err(e), None),
        };
        let result = interpret(requested, outcome);
        self.notify(&job.request, &result);
        self.activity.activity_ended();

        match result {
            Ok(response) => {
                debug!(status = response.status(), url = %requested, "Request succeeded");
                job.succeed(response, location, &self.callbacks);
            }
            Err((error, response)) => {
                info!(error = %error, url = %requested, "Request failed");
                if let Some(location) = &location {
                    let _ = std::fs::remove_file(location);
                }
                let failure = if error.is_recoverable() {
                    let scheduler: Weak<dyn Rescheduler> = self.weak_self.clone();
                    RequestFailure::recoverable(error, response, scheduler, job.clone())
                } else {
                    RequestFailure::new(error, response)
                };
                job.fail(failure, &self.callbacks);
            }
        }
    }

    fn notify(&self, request: &Request, result: &Result<Response, (RequestError, Option<Response>)>) {
        let observers = self
            .observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for observer in &observers {
            match result {
                Ok(response) => observer.did_receive_response(request, response),
                Err((error, response)) => {
                    if let Some(response) = response {
                        observer.did_receive_response(request, response);
                    }
                    observer.did_error(request, error, response.as_ref());
                }
            }
        }
    }

    /// Ends a job without dispatching it.
    fn abort(&self, job: Job, error: RequestError) {
        debug!(error = %error, path = job.request.path().unwrap_or_default(), "Request aborted");
        self.activity.activity_ended();
        job.fail(RequestFailure::new(error, None), &self.callbacks);
    }
}

impl Rescheduler for Shared {
    fn reschedule(&self, job: Job) {
        if let Some(shared) = self.weak_self.upgrade() {
            shared.schedule(job);
        }
    }
}

// ============================================================================
// Request Controller
// ============================================================================

/// Issues requests against one base URL, gating them on credential freshness.
///
/// Cloning is cheap; clones share all state.
#[derive(Clone)]
pub struct RequestController {
    shared: Arc<Shared>,
}

impl RequestController {
    /// Starts building a controller for `base_url`.
    pub fn builder(base_url: impl Into<String>) -> RequestControllerBuilder {
        RequestControllerBuilder::new(base_url)
    }

    /// Creates a controller with default settings.
    ///
    /// # Errors
    ///
    /// See [`RequestControllerBuilder::build`].
    pub fn new(base_url: impl Into<String>) -> Result<Self, RequestError> {
        Self::builder(base_url).build()
    }

    /// The normalized base URL, always ending in `/`.
    pub fn base_url(&self) -> &Url {
        &self.shared.base_url
    }

    /// The controller settings.
    pub fn settings(&self) -> &ClientSettings {
        &self.shared.settings
    }

    /// Starts a request against the base URL.
    pub fn new_request(&self, method: HttpMethod, path: impl Into<String>) -> RequestBuilder {
        Request::builder(self.shared.base_url.clone(), method).path(path)
    }

    /// Schedules a request; `completion` is called on the callback queue.
    pub fn schedule<F>(&self, request: Request, completion: F)
    where
        F: Fn(Result<Response, RequestFailure>) + Send + Sync + 'static,
    {
        let completion: Completion = Arc::new(completion);
        self.shared.schedule(Job::data(request, completion));
    }

    /// Builds and schedules a request, returning it.
    pub fn request<F>(&self, path: &str, method: HttpMethod, options: RequestOptions, completion: F) -> Request
    where
        F: Fn(Result<Response, RequestFailure>) + Send + Sync + 'static,
    {
        let request = options.apply(self.new_request(method, path)).build();
        self.schedule(request.clone(), completion);
        request
    }

    /// Schedules a request and waits for its completion.
    ///
    /// # Errors
    ///
    /// Returns the failure delivered to the completion.
    pub async fn send(&self, request: Request) -> Result<Response, RequestFailure> {
        let (tx, rx) = oneshot::channel();
        let tx = Mutex::new(Some(tx));
        self.schedule(request, move |result| {
            if let Some(tx) = tx.lock().unwrap_or_else(PoisonError::into_inner).take() {
                let _ = tx.send(result);
            }
        });

        rx.await
            .unwrap_or_else(|_| Err(RequestFailure::from(RequestError::ControllerDropped)))
    }

    /// Sends a GET request for `path`.
    ///
    /// # Errors
    ///
    /// Returns the failure delivered to the completion.
    pub async fn get(&self, path: &str) -> Result<Response, RequestFailure> {
        self.send(self.new_request(HttpMethod::Get, path).build()).await
    }

    /// Uploads a file with POST.
    pub fn upload_file<F>(
        &self,
        path: &str,
        file: impl Into<PathBuf>,
        progress: Option<ProgressHandler>,
        completion: F,
    ) -> Request
    where
        F: Fn(Result<Response, RequestFailure>) + Send + Sync + 'static,
    {
        let request = self.new_request(HttpMethod::Post, path).build();
        self.shared.schedule(Job {
            request: request.clone(),
            kind: JobKind::Upload {
                source: UploadSource::File(file.into()),
                progress,
                completion: Arc::new(completion),
            },
        });
        request
    }

    /// Uploads bytes with POST, sniffing the content type.
    pub fn upload_data<F>(
        &self,
        path: &str,
        data: impl Into<Vec<u8>>,
        progress: Option<ProgressHandler>,
        completion: F,
    ) -> Request
    where
        F: Fn(Result<Response, RequestFailure>) + Send + Sync + 'static,
    {
        let data = data.into();
        let mut builder = self.new_request(HttpMethod::Post, path);
        if let Some(content_type) = sniff_content_type(&data) {
            builder = builder.header("Content-Type", content_type);
        }
        let request = builder.build();

        self.shared.schedule(Job {
            request: request.clone(),
            kind: JobKind::Upload {
                source: UploadSource::Data(Arc::new(data)),
                progress,
                completion: Arc::new(completion),
            },
        });
        request
    }

    /// Downloads `path` into a temporary file.
    ///
    /// The file is left in place for the caller to move or delete.
    pub fn download<F>(&self, path: &str, progress: Option<ProgressHandler>, completion: F) -> Request
    where
        F: Fn(Result<Download, RequestFailure>) + Send + Sync + 'static,
    {
        let request = self.new_request(HttpMethod::Get, path).build();
        let completion: DownloadCompletion = Arc::new(completion);
        self.shared.schedule(Job {
            request: request.clone(),
            kind: JobKind::Download { progress, completion },
        });
        request
    }

    /// Cancels everything, resets the transport and fails every request waiting
    /// for a refresh with [`RequestError::Cancelled`].
    pub fn cancel_all(&self) {
        let in_flight = self.shared.tasks.cancel_all();
        self.shared.transport.reset();
        let queued = self.shared.gate.remove_pending(|_| true);
        info!(in_flight, queued = queued.len(), "Cancelled all requests");

        for job in queued {
            self.shared.abort(job, RequestError::Cancelled);
        }
    }

    /// Cancels requests carrying `tag`, in flight on any tier or waiting for a refresh.
    pub fn cancel_requests_with(&self, tag: u64) {
        let in_flight = self.shared.tasks.cancel_tagged(tag);
        let queued = self
            .shared
            .gate
            .remove_pending(|job| job.request.tag() == Some(tag));
        info!(tag, in_flight, queued = queued.len(), "Cancelled tagged requests");

        for job in queued {
            self.shared.abort(job, RequestError::Cancelled);
        }
    }

    /// Replaces the shared credential.
    ///
    /// With `persist`, the credential is stored under the authenticator's
    /// identifier, or the base-URL identifier when there is no authenticator.
    /// `None` clears the credential, and with `persist` also the stored copy.
    ///
    /// # Errors
    ///
    /// Returns the store error if persisting fails; the credential is left unchanged.
    pub fn set_shared_credential(&self, credential: Option<Credential>, persist: bool) -> Result<(), StoreError> {
        self.shared.gate.set_credential(credential, persist)
    }

    /// The current shared credential.
    pub fn shared_credential(&self) -> Option<Credential> {
        self.shared.gate.credential()
    }

    /// Installs or removes the authenticator.
    ///
    /// Installing one loads the credential stored under its identifier.
    pub fn set_authenticator(&self, authenticator: Option<Arc<dyn Authenticator>>) {
        self.shared.gate.set_authenticator(authenticator);
    }

    /// Runs the authenticator's initial authentication and installs the result.
    ///
    /// # Errors
    ///
    /// Fails if no authenticator is set, authentication fails, or the
    /// credential cannot be persisted.
    #[instrument(skip(self), fields(base_url = %self.shared.base_url))]
    pub async fn authenticate(&self) -> Result<Credential, RequestError> {
        let authenticator = self
            .shared
            .gate
            .authenticator()
            .ok_or(RequestError::NoAuthenticator)?;

        let authentication = authenticator.authenticate().await?;
        self.shared
            .gate
            .set_credential(Some(authentication.credential.clone()), authentication.persist)?;
        info!(identifier = %authenticator.auth_identifier(), "Authenticated");
        Ok(authentication.credential)
    }

    /// Sets or unsets (`None`) a default header.
    pub fn set_default_header(&self, name: impl Into<String>, value: Option<String>) {
        self.shared
            .default_headers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), value);
    }

    /// The default headers merged into every request.
    pub fn default_headers(&self) -> Headers {
        self.shared.default_headers()
    }

    /// Registers an observer.
    pub fn add_observer(&self, observer: Arc<dyn RequestObserver>) {
        self.shared
            .observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    /// Returns true while a credential refresh is in flight.
    pub fn is_re_authenticating(&self) -> bool {
        self.shared.gate.is_re_authenticating()
    }

    /// Number of requests waiting for a refresh.
    pub fn pending_authentication(&self) -> usize {
        self.shared.gate.pending_len()
    }

    /// Number of tasks in flight.
    pub fn in_flight(&self) -> usize {
        self.shared.tasks.in_flight()
    }
}

impl std::fmt::Debug for RequestController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestController")
            .field("base_url", &self.shared.base_url.as_str())
            .field("settings", &self.shared.settings)
            .field("gate", &self.shared.gate)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Request Controller Builder
// ============================================================================

/// Builder for [`RequestController`].
pub struct RequestControllerBuilder {
    base_url: String,
    settings: ClientSettings,
    transport: Option<Arc<dyn Transport>>,
    credential_store: Option<CredentialStore>,
    authenticator: Option<Arc<dyn Authenticator>>,
    credential: Option<Credential>,
    callback_queue: Option<CallbackQueue>,
    activity: Option<Arc<dyn ActivityObserver>>,
    observers: Vec<Arc<dyn RequestObserver>>,
    runtime: Option<Handle>,
}

impl RequestControllerBuilder {
    /// Creates a builder for `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            settings: ClientSettings::default(),
            transport: None,
            credential_store: None,
            authenticator: None,
            credential: None,
            callback_queue: None,
            activity: None,
            observers: Vec::new(),
            runtime: None,
        }
    }

    /// Sets the settings.
    #[must_use]
    pub fn settings(mut self, settings: ClientSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets the transport. Defaults to [`ReqwestTransport`].
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the credential store. Defaults to the system keychain.
    #[must_use]
    pub fn credential_store(mut self, store: CredentialStore) -> Self {
        self.credential_store = Some(store);
        self
    }

    /// Sets the authenticator.
    #[must_use]
    pub fn authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    /// Sets the initial shared credential, kept in memory only.
    #[must_use]
    pub fn credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Sets where completions run.
    #[must_use]
    pub fn callback_queue(mut self, queue: CallbackQueue) -> Self {
        self.callback_queue = Some(queue);
        self
    }

    /// Sets the activity observer. Defaults to a private [`ActivityCounter`].
    #[must_use]
    pub fn activity_observer(mut self, observer: Arc<dyn ActivityObserver>) -> Self {
        self.activity = Some(observer);
        self
    }

    /// Adds a request observer.
    #[must_use]
    pub fn observer(mut self, observer: Arc<dyn RequestObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Sets the runtime that drives requests. Defaults to the current one.
    #[must_use]
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Builds the controller.
    ///
    /// Loads any credential stored under the base-URL identifier unless one was
    /// given, then the credential stored for the authenticator.
    ///
    /// # Errors
    ///
    /// Fails if the base URL is invalid, no runtime is available, the default
    /// transport cannot be created, or the callback thread cannot be spawned.
    pub fn build(self) -> Result<RequestController, RequestError> {
        let parsed = Url::parse(&self.base_url)
            .map_err(|e| RequestError::InvalidBaseUrl(format!("{}: {e}", self.base_url)))?;
        if parsed.cannot_be_a_base() {
            return Err(RequestError::InvalidBaseUrl(self.base_url));
        }
        let base_url = normalize_base_url(parsed);

        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|e| RequestError::NoRuntime(e.to_string()))?,
        };

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(&self.settings)?),
        };

        let callbacks = match self.callback_queue {
            Some(queue) => queue,
            None if self.settings.synchronous => CallbackQueue::inline(),
            None => CallbackQueue::dedicated("courier-callbacks")?,
        };

        let gate = AuthGate::new(
            self.credential_store.unwrap_or_default(),
            default_credential_identifier(&base_url),
        );
        if self.credential.is_none() {
            gate.load_default();
        }
        if let Some(authenticator) = self.authenticator {
            gate.set_authenticator(Some(authenticator));
        }
        if let Some(credential) = self.credential {
            gate.set_credential(Some(credential), false)?;
        }

        let default_headers = RwLock::new(self.settings.effective_headers());
        let activity = self
            .activity
            .unwrap_or_else(|| Arc::new(ActivityCounter::new()));

        debug!(base_url = %base_url, synchronous = self.settings.synchronous, "Request controller created");

        let shared = Arc::new_cyclic(|weak_self| Shared {
            base_url,
            settings: self.settings,
            default_headers,
            gate,
            transport,
            tasks: TaskRegistry::new(),
            callbacks,
            activity,
            observers: RwLock::new(self.observers),
            runtime,
            weak_self: weak_self.clone(),
        });

        Ok(RequestController { shared })
    }
}

impl std::fmt::Debug for RequestControllerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestControllerBuilder")
            .field("base_url", &self.base_url)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
