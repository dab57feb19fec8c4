//! Scheduling, credential gating and cancellation, driven through a mock transport.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use courier_client::body::JsonBody;
use courier_client::{
    ActivityCounter, ClientSettings, MockResponse, MockTransport, Progress, RequestController,
    RequestError, RequestFailure, RequestObserver, RequestOptions, Response, SessionTier,
    default_credential_identifier,
};
use courier_core::{AuthError, Authentication, Authenticator, Credential, HttpMethod};
use courier_store::{CredentialStore, MemoryStore};
use serde_json::json;
use tokio::sync::{Semaphore, mpsc};

// ============================================================================
// Helpers
// ============================================================================

const AUTH_ID: &str = "controller-tests";

type Outcome = (&'static str, Result<u16, RequestError>);

fn memory_store() -> (CredentialStore, Arc<MemoryStore>) {
    let backend = Arc::new(MemoryStore::new());
    (CredentialStore::new(backend.clone()), backend)
}

fn ok_transport() -> Arc<MockTransport> {
    Arc::new(MockTransport::always(MockResponse::status(200)))
}

fn controller(transport: &Arc<MockTransport>) -> RequestController {
    RequestController::builder("https://api.example.com")
        .transport(transport.clone())
        .credential_store(memory_store().0)
        .build()
        .unwrap()
}

fn expired() -> Credential {
    Credential::oauth2("stale", Some("refresh".into()), Utc::now() - chrono::Duration::minutes(1))
}

fn recorder(
    label: &'static str,
    tx: &mpsc::UnboundedSender<Outcome>,
) -> impl Fn(Result<Response, RequestFailure>) + Send + Sync + 'static {
    let tx = tx.clone();
    move |result| {
        let _ = tx.send((
            label,
            result.map(|r| r.status()).map_err(RequestFailure::into_error),
        ));
    }
}

async fn collect(rx: &mut mpsc::UnboundedReceiver<Outcome>, count: usize) -> Vec<Outcome> {
    let mut outcomes = Vec::new();
    for _ in 0..count {
        let outcome = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("completion not delivered in time")
            .expect("channel closed");
        outcomes.push(outcome);
    }
    outcomes
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met in time");
}

/// Authenticator whose refresh waits for a permit, so tests can hold it in flight.
struct GatedAuthenticator {
    calls: AtomicUsize,
    permits: Semaphore,
    failure: Option<AuthError>,
}

impl GatedAuthenticator {
    fn blocked() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            permits: Semaphore::new(0),
            failure: None,
        })
    }

    fn failing(error: AuthError) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            permits: Semaphore::new(Semaphore::MAX_PERMITS),
            failure: Some(error),
        })
    }

    fn release(&self) {
        self.permits.add_permits(1);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Authenticator for GatedAuthenticator {
    async fn authenticate(&self) -> Result<Authentication, AuthError> {
        Ok(Authentication::persisted(Credential::with_token("initial")))
    }

    async fn re_authenticate(&self, credential: &Credential) -> Result<Authentication, AuthError> {
        assert_eq!(credential.authorization_token.as_deref(), Some("stale"));
        self.calls.fetch_add(1, Ordering::SeqCst);

        let permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| AuthError::Failed(e.to_string()))?;
        permit.forget();

        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(Authentication::in_memory(Credential::with_token("fresh"))),
        }
    }

    fn auth_identifier(&self) -> &str {
        AUTH_ID
    }
}

fn gated_controller(
    transport: &Arc<MockTransport>,
    authenticator: Arc<GatedAuthenticator>,
) -> RequestController {
    RequestController::builder("https://api.example.com")
        .transport(transport.clone())
        .credential_store(memory_store().0)
        .authenticator(authenticator)
        .credential(expired())
        .build()
        .unwrap()
}

// ============================================================================
// Dispatch
// ============================================================================

#[tokio::test]
async fn test_no_authenticator_dispatches_immediately() {
    let transport = ok_transport();
    let controller = controller(&transport);

    let response = controller.get("users").await.unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(transport.requested_paths(), vec!["/users"]);
    assert!(!controller.is_re_authenticating());
    let request = transport.last_request().unwrap();
    assert!(request.wire.headers.get("authorization").is_none());
    assert_eq!(request.tier, SessionTier::Default);
}

#[tokio::test]
async fn test_base_url_is_normalized() {
    let transport = ok_transport();
    let controller = controller(&transport);

    assert_eq!(controller.base_url().as_str(), "https://api.example.com/");
    controller.get("users").await.unwrap();
    assert_eq!(
        transport.last_request().unwrap().wire.url.as_str(),
        "https://api.example.com/users"
    );
}

#[tokio::test]
async fn test_request_options_are_applied() {
    let transport = ok_transport();
    let controller = controller(&transport);
    let (tx, mut rx) = mpsc::unbounded_channel();

    let request = controller.request(
        "items",
        HttpMethod::Post,
        RequestOptions::new()
            .body(JsonBody::new(json!({"name": "widget"})))
            .content_type("application/vnd.items+json")
            .query("dry_run", "true")
            .header("X-Trace", "abc")
            .tag(42),
        recorder("items", &tx),
    );
    assert_eq!(request.tag(), Some(42));

    let outcomes = collect(&mut rx, 1).await;
    assert_eq!(outcomes[0].1.as_ref().unwrap(), &200);

    let wire = transport.last_request().unwrap().wire;
    assert_eq!(wire.url.as_str(), "https://api.example.com/items?dry_run=true");
    assert_eq!(wire.headers["content-type"], "application/vnd.items+json");
    assert_eq!(wire.headers["x-trace"], "abc");
    assert!(wire.headers["user-agent"].to_str().unwrap().starts_with("courier/"));
}

#[tokio::test]
async fn test_get_never_carries_content_type() {
    let transport = ok_transport();
    let controller = controller(&transport);
    controller.set_default_header("Content-Type", Some("application/json".to_string()));

    let request = controller
        .new_request(HttpMethod::Get, "search")
        .body(JsonBody::new(json!({"mistake": true})))
        .build();
    controller.send(request).await.unwrap();

    let wire = transport.last_request().unwrap().wire;
    assert!(wire.headers.get("content-type").is_none());
    assert!(wire.body.is_none());
}

#[tokio::test]
async fn test_authorization_header_from_shared_credential() {
    let transport = ok_transport();
    let controller = controller(&transport);
    controller
        .set_shared_credential(Some(Credential::with_token("abc")), false)
        .unwrap();

    controller.get("me").await.unwrap();
    assert_eq!(
        transport.last_request().unwrap().wire.headers["authorization"],
        "Bearer abc"
    );

    let explicit = controller
        .new_request(HttpMethod::Get, "me")
        .header("Authorization", "Token custom")
        .build();
    controller.send(explicit).await.unwrap();
    assert_eq!(
        transport.last_request().unwrap().wire.headers["authorization"],
        "Token custom"
    );
}

#[tokio::test]
async fn test_construction_error_is_not_dispatched() {
    let transport = ok_transport();
    let controller = controller(&transport);

    let failure = controller.get("https://elsewhere.example.com/").await.unwrap_err();

    assert!(matches!(failure.error(), RequestError::InvalidUrl(_)));
    assert!(failure.recovery_options().is_empty());
    assert!(transport.requests().is_empty());
}

// ============================================================================
// Status errors & recovery
// ============================================================================

#[tokio::test]
async fn test_status_404_offers_retry_and_cancel() {
    let transport = ok_transport();
    transport.route("/status/404", MockResponse::status(404).with_body("nope"));
    let controller = controller(&transport);

    let failure = controller.get("status/404").await.unwrap_err();

    assert_eq!(failure.status_code(), Some(404));
    assert_eq!(failure.response().unwrap().text(), Some("nope"));
    let titles: Vec<String> = failure
        .recovery_options()
        .iter()
        .map(|option| option.title().to_string())
        .collect();
    assert_eq!(titles, vec!["Retry", "Cancel"]);

    assert!(failure.retry());
    wait_until(|| transport.requests().len() == 2).await;
    assert_eq!(transport.requested_paths(), vec!["/status/404", "/status/404"]);
}

#[tokio::test]
async fn test_retry_repeats_completion() {
    let transport = Arc::new(MockTransport::new());
    transport.queue_response(MockResponse::status(503));
    transport.queue_response(MockResponse::status(200));
    let controller = controller(&transport);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let failures: Arc<Mutex<Vec<RequestFailure>>> = Arc::default();
    let stash = failures.clone();
    controller.schedule(controller.new_request(HttpMethod::Get, "flaky").build(), move |result| {
        match result {
            Ok(response) => {
                let _ = tx.send(response.status());
            }
            Err(failure) => {
                let _ = tx.send(failure.status_code().unwrap_or_default());
                stash.lock().unwrap().push(failure);
            }
        }
    });

    assert_eq!(rx.recv().await, Some(503));
    assert!(failures.lock().unwrap()[0].retry());
    assert_eq!(rx.recv().await, Some(200));
}

#[tokio::test]
async fn test_transport_error_is_recoverable() {
    let transport = Arc::new(MockTransport::new());
    let controller = controller(&transport);

    let failure = controller.get("nowhere").await.unwrap_err();
    assert!(matches!(failure.error(), RequestError::Transport(_)));
    assert_eq!(failure.recovery_options().len(), 2);
}

// ============================================================================
// Credential gating
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_expired_requests_refresh_once() {
    let transport = ok_transport();
    let authenticator = GatedAuthenticator::blocked();
    let controller = gated_controller(&transport, authenticator.clone());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let controller = controller.clone();
            tokio::spawn(async move { controller.get(&format!("item/{i}")).await })
        })
        .collect();

    wait_until(|| controller.is_re_authenticating() && controller.pending_authentication() == 7)
        .await;
    assert_eq!(authenticator.calls(), 1);
    assert!(transport.requests().is_empty());

    authenticator.release();
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap().status(), 200);
    }

    assert_eq!(authenticator.calls(), 1);
    assert!(!controller.is_re_authenticating());
    assert_eq!(controller.pending_authentication(), 0);
    assert_eq!(transport.requests().len(), 8);
    for request in transport.requests() {
        assert_eq!(request.wire.headers["authorization"], "Bearer fresh");
    }
}

#[tokio::test]
async fn test_queued_requests_resubmitted_in_arrival_order() {
    let transport = ok_transport();
    let authenticator = GatedAuthenticator::blocked();
    let controller = gated_controller(&transport, authenticator.clone());
    let (tx, mut rx) = mpsc::unbounded_channel();

    for (label, path) in [("init", "init"), ("a", "a"), ("b", "b"), ("c", "c")] {
        controller.schedule(
            controller.new_request(HttpMethod::Get, path).build(),
            recorder(label, &tx),
        );
    }
    assert!(controller.is_re_authenticating());
    assert_eq!(controller.pending_authentication(), 3);

    authenticator.release();
    let outcomes = collect(&mut rx, 4).await;

    assert!(outcomes.iter().all(|(_, result)| result.is_ok()));
    assert_eq!(transport.requested_paths(), vec!["/init", "/a", "/b", "/c"]);
    assert_eq!(
        controller.shared_credential().unwrap().authorization_token.as_deref(),
        Some("fresh")
    );
}

#[tokio::test]
async fn test_refresh_failure_reaches_initiator_and_drains_queue() {
    let transport = ok_transport();
    let authenticator = GatedAuthenticator::failing(AuthError::Rejected("revoked".into()));
    let controller = gated_controller(&transport, authenticator.clone());
    let (tx, mut rx) = mpsc::unbounded_channel();

    for label in ["init", "a", "b"] {
        controller.schedule(
            controller.new_request(HttpMethod::Get, label).build(),
            recorder(label, &tx),
        );
    }
    assert_eq!(controller.pending_authentication(), 2);

    let outcomes = collect(&mut rx, 3).await;

    let (label, first) = &outcomes[0];
    assert_eq!(*label, "init");
    assert!(matches!(
        first,
        Err(RequestError::Authentication(AuthError::Rejected(_)))
    ));
    // The credential is still expired, so each released request tries again.
    for (_, outcome) in &outcomes {
        assert!(matches!(outcome, Err(RequestError::Authentication(_))));
    }
    assert_eq!(authenticator.calls(), 3);
    assert!(!controller.is_re_authenticating());
    assert_eq!(controller.pending_authentication(), 0);
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_authenticate_installs_and_persists() {
    let transport = ok_transport();
    let (store, backend) = memory_store();
    let controller = RequestController::builder("https://api.example.com")
        .transport(transport.clone())
        .credential_store(store)
        .authenticator(GatedAuthenticator::blocked())
        .build()
        .unwrap();

    let credential = controller.authenticate().await.unwrap();

    assert_eq!(credential.authorization_token.as_deref(), Some("initial"));
    assert_eq!(controller.shared_credential(), Some(credential));
    assert!(backend.accessibility(AUTH_ID).is_some());
}

#[tokio::test]
async fn test_authenticate_without_authenticator() {
    let controller = controller(&ok_transport());
    assert!(matches!(
        controller.authenticate().await,
        Err(RequestError::NoAuthenticator)
    ));
}

#[tokio::test]
async fn test_set_authenticator_loads_stored_credential() {
    let transport = ok_transport();
    let (store, _) = memory_store();
    store
        .store(Some(&Credential::with_token("stored")), AUTH_ID, Default::default())
        .unwrap();

    let controller = RequestController::builder("https://api.example.com")
        .transport(transport.clone())
        .credential_store(store)
        .build()
        .unwrap();
    assert!(controller.shared_credential().is_none());

    controller.set_authenticator(Some(GatedAuthenticator::blocked()));
    controller.get("me").await.unwrap();
    assert_eq!(
        transport.last_request().unwrap().wire.headers["authorization"],
        "Bearer stored"
    );
}

#[tokio::test]
async fn test_shared_credential_persists_under_base_url_identifier() {
    let transport = ok_transport();
    let (store, backend) = memory_store();
    let build = || {
        RequestController::builder("https://api.example.com")
            .transport(transport.clone())
            .credential_store(store.clone())
            .build()
            .unwrap()
    };

    let first = build();
    first
        .set_shared_credential(Some(Credential::with_basic("amy", "secret")), true)
        .unwrap();
    let identifier = default_credential_identifier(first.base_url());
    assert_eq!(identifier, "courier-https://api.example.com/");
    assert!(backend.accessibility(&identifier).is_some());

    let second = build();
    assert_eq!(
        second.shared_credential().unwrap().username.as_deref(),
        Some("amy")
    );

    second.set_shared_credential(None, true).unwrap();
    assert!(backend.is_empty());
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn test_cancel_by_tag_removes_queued_entries() {
    let transport = ok_transport();
    let authenticator = GatedAuthenticator::blocked();
    let controller = gated_controller(&transport, authenticator.clone());
    let (tx, mut rx) = mpsc::unbounded_channel();

    for (label, tag) in [("init", 1), ("a", 7), ("b", 8)] {
        controller.request(label, HttpMethod::Get, RequestOptions::new().tag(tag), recorder(label, &tx));
    }
    assert_eq!(controller.pending_authentication(), 2);

    controller.cancel_requests_with(7);
    assert_eq!(controller.pending_authentication(), 1);

    let cancelled = collect(&mut rx, 1).await;
    assert_eq!(cancelled[0].0, "a");
    assert!(matches!(cancelled[0].1, Err(RequestError::Cancelled)));

    authenticator.release();
    let rest = collect(&mut rx, 2).await;
    assert!(rest.iter().all(|(_, result)| result.is_ok()));
    assert_eq!(transport.requested_paths(), vec!["/init", "/b"]);
}

#[tokio::test]
async fn test_cancel_in_flight_by_tag() {
    let transport = ok_transport();
    transport.set_latency(Duration::from_secs(30));
    let controller = controller(&transport);
    let (tx, mut rx) = mpsc::unbounded_channel();

    controller.request("slow", HttpMethod::Get, RequestOptions::new().tag(3), recorder("slow", &tx));
    controller.request(
        "other",
        HttpMethod::Get,
        RequestOptions::new().tag(4).tier(SessionTier::Ephemeral),
        recorder("other", &tx),
    );
    wait_until(|| controller.in_flight() == 2).await;

    controller.cancel_requests_with(3);
    let outcomes = collect(&mut rx, 1).await;
    assert_eq!(outcomes[0].0, "slow");
    assert!(outcomes[0].1.as_ref().unwrap_err().is_cancelled());
    assert_eq!(controller.in_flight(), 1);

    controller.cancel_all();
    let outcomes = collect(&mut rx, 1).await;
    assert_eq!(outcomes[0].0, "other");
    assert!(outcomes[0].1.as_ref().unwrap_err().is_cancelled());
    assert_eq!(controller.in_flight(), 0);
    assert_eq!(transport.reset_count(), 1);
}

#[tokio::test]
async fn test_cancel_right_after_scheduling() {
    let transport = ok_transport();
    transport.set_latency(Duration::from_millis(200));
    let controller = controller(&transport);
    let (tx, mut rx) = mpsc::unbounded_channel();

    controller.request("slow", HttpMethod::Get, RequestOptions::new().tag(9), recorder("slow", &tx));
    assert_eq!(controller.in_flight(), 1);
    controller.cancel_requests_with(9);

    let outcomes = collect(&mut rx, 1).await;
    assert_eq!(outcomes[0].0, "slow");
    assert!(outcomes[0].1.as_ref().unwrap_err().is_cancelled());

    controller.request("next", HttpMethod::Get, RequestOptions::new(), recorder("next", &tx));
    controller.cancel_all();

    let outcomes = collect(&mut rx, 1).await;
    assert_eq!(outcomes[0].0, "next");
    assert!(outcomes[0].1.as_ref().unwrap_err().is_cancelled());
    assert!(transport.requests().is_empty());
    assert_eq!(controller.in_flight(), 0);
}

#[tokio::test]
async fn test_cancel_all_fails_queued_requests() {
    let transport = ok_transport();
    let authenticator = GatedAuthenticator::blocked();
    let controller = gated_controller(&transport, authenticator.clone());
    let (tx, mut rx) = mpsc::unbounded_channel();

    for label in ["init", "a", "b"] {
        controller.schedule(
            controller.new_request(HttpMethod::Get, label).build(),
            recorder(label, &tx),
        );
    }

    controller.cancel_all();
    let cancelled = collect(&mut rx, 2).await;
    assert_eq!(
        cancelled.iter().map(|(label, _)| *label).collect::<Vec<_>>(),
        vec!["a", "b"]
    );
    assert_eq!(controller.pending_authentication(), 0);

    authenticator.release();
    let init = collect(&mut rx, 1).await;
    assert_eq!(init[0].0, "init");
    assert!(init[0].1.is_ok());
}

// ============================================================================
// Activity & observers
// ============================================================================

#[derive(Default)]
struct RecordingObserver {
    responses: Mutex<Vec<u16>>,
    errors: Mutex<Vec<String>>,
}

impl RequestObserver for RecordingObserver {
    fn did_receive_response(&self, _request: &courier_client::Request, response: &Response) {
        self.responses.lock().unwrap().push(response.status());
    }

    fn did_error(
        &self,
        request: &courier_client::Request,
        _error: &RequestError,
        _response: Option<&Response>,
    ) {
        self.errors
            .lock()
            .unwrap()
            .push(request.path().unwrap_or_default().to_string());
    }
}

#[tokio::test]
async fn test_activity_and_observers() {
    let transport = Arc::new(MockTransport::new());
    transport.route("/ok", MockResponse::status(200));
    transport.route("/missing", MockResponse::status(404));
    let activity = Arc::new(ActivityCounter::new());
    let observer = Arc::new(RecordingObserver::default());

    let controller = RequestController::builder("https://api.example.com")
        .transport(transport.clone())
        .credential_store(memory_store().0)
        .activity_observer(activity.clone())
        .observer(observer.clone())
        .build()
        .unwrap();

    controller.get("ok").await.unwrap();
    controller.get("missing").await.unwrap_err();
    controller.get("unrouted").await.unwrap_err();
    controller.get("http://bad").await.unwrap_err();

    assert_eq!(activity.count(), 0);
    assert_eq!(*observer.responses.lock().unwrap(), vec![200, 404]);
    assert_eq!(*observer.errors.lock().unwrap(), vec!["missing", "unrouted"]);
}

// ============================================================================
// Transfers
// ============================================================================

#[tokio::test]
async fn test_upload_data_reports_progress() {
    let transport = ok_transport();
    let controller = controller(&transport);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let progress: Arc<Mutex<Vec<Progress>>> = Arc::default();
    let sink = progress.clone();

    let png = vec![0x89, b'P', b'N', b'G', 1, 2, 3];
    controller.upload_data(
        "photos",
        png.clone(),
        Some(Arc::new(move |p: Progress| sink.lock().unwrap().push(p))),
        recorder("upload", &tx),
    );

    let outcomes = collect(&mut rx, 1).await;
    assert!(outcomes[0].1.is_ok());

    let request = transport.last_request().unwrap();
    assert_eq!(request.tier, SessionTier::Background);
    assert_eq!(request.wire.method, HttpMethod::Post);
    assert_eq!(request.wire.headers["content-type"], "image/png");
    assert_eq!(request.wire.body.as_deref(), Some(png.as_slice()));

    let progress = progress.lock().unwrap();
    let last = progress.last().unwrap();
    assert_eq!(last.transferred_bytes, 7);
    assert_eq!(last.total_bytes, Some(7));
}

#[tokio::test]
async fn test_upload_file() {
    let transport = ok_transport();
    let controller = controller(&transport);
    let (tx, mut rx) = mpsc::unbounded_channel();

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("report.csv");
    std::fs::write(&file, "a,b\n1,2\n").unwrap();

    controller.upload_file("reports", &file, None, recorder("upload", &tx));
    assert!(collect(&mut rx, 1).await[0].1.is_ok());
    assert_eq!(
        transport.last_request().unwrap().wire.body.as_deref(),
        Some(&b"a,b\n1,2\n"[..])
    );

    controller.upload_file("reports", dir.path().join("missing.csv"), None, recorder("missing", &tx));
    let outcome = collect(&mut rx, 1).await;
    assert!(matches!(outcome[0].1, Err(RequestError::Transport(_))));
}

#[tokio::test]
async fn test_download_writes_temp_file() {
    let transport = Arc::new(MockTransport::new());
    transport.route("/files/readme", MockResponse::status(200).with_body("hello"));
    let controller = controller(&transport);
    let (tx, mut rx) = mpsc::unbounded_channel();

    controller.download("files/readme", None, move |result| {
        let _ = tx.send(result.map(|download| download.location).map_err(RequestFailure::into_error));
    });

    let location = rx.recv().await.unwrap().unwrap();
    assert_eq!(std::fs::read_to_string(&location).unwrap(), "hello");
    std::fs::remove_file(location).unwrap();
}

// ============================================================================
// Synchronous mode
// ============================================================================

#[test]
fn test_synchronous_mode_blocks_until_completion() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let transport = ok_transport();
    let controller = RequestController::builder("https://api.example.com")
        .settings(ClientSettings::default().with_synchronous(true))
        .runtime(runtime.handle().clone())
        .transport(transport.clone())
        .credential_store(memory_store().0)
        .build()
        .unwrap();

    let status = Arc::new(Mutex::new(None));
    let slot = status.clone();
    controller.schedule(controller.new_request(HttpMethod::Get, "sync").build(), move |result| {
        *slot.lock().unwrap() = Some(result.map(|r| r.status()).ok());
    });

    assert_eq!(*status.lock().unwrap(), Some(Some(200)));
}

#[test]
fn test_synchronous_mode_blocks_while_queued_behind_refresh() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let transport = ok_transport();
    let authenticator = GatedAuthenticator::blocked();
    let controller = RequestController::builder("https://api.example.com")
        .settings(ClientSettings::default().with_synchronous(true))
        .runtime(runtime.handle().clone())
        .transport(transport.clone())
        .credential_store(memory_store().0)
        .authenticator(authenticator.clone())
        .credential(expired())
        .build()
        .unwrap();

    let schedule_blocking = |label: &'static str| {
        let controller = controller.clone();
        std::thread::spawn(move || {
            let status = Arc::new(Mutex::new(None));
            let slot = status.clone();
            controller.schedule(controller.new_request(HttpMethod::Get, label).build(), move |result| {
                *slot.lock().unwrap() = result.map(|r| r.status()).ok();
            });
            // Read as soon as schedule returns.
            let seen = *status.lock().unwrap();
            seen
        })
    };

    let first = schedule_blocking("first");
    wait_blocking(|| controller.is_re_authenticating());
    let second = schedule_blocking("second");
    wait_blocking(|| controller.pending_authentication() == 1);

    assert!(!second.is_finished());
    authenticator.release();

    assert_eq!(first.join().unwrap(), Some(200));
    assert_eq!(second.join().unwrap(), Some(200));
    assert_eq!(authenticator.calls(), 1);
}

fn wait_blocking(mut condition: impl FnMut() -> bool) {
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(std::time::Instant::now() < deadline, "condition not met in time");
        std::thread::sleep(Duration::from_millis(5));
    }
}
