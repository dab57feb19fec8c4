//! End-to-end tests of the reqwest transport against a local mock server.

use std::sync::Arc;
use std::time::Duration;

use courier_client::body::{FormBody, JsonBody};
use courier_client::{
    ClientSettings, DEFAULT_USER_AGENT, RequestController, RequestError, RequestFailure,
    TransportError,
};
use courier_core::{Credential, HttpMethod};
use courier_store::{CredentialStore, MemoryStore};
use serde_json::json;
use tokio::sync::mpsc;
use wiremock::matchers::{body_bytes, body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Test Setup
// ============================================================================

fn controller_for(server: &MockServer, settings: ClientSettings) -> RequestController {
    RequestController::builder(server.uri())
        .settings(settings)
        .credential_store(CredentialStore::new(Arc::new(MemoryStore::new())))
        .build()
        .expect("failed to build controller")
}

// ============================================================================
// Requests
// ============================================================================

#[tokio::test]
async fn test_json_post_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/items"))
        .and(query_param("notify", "false"))
        .and(header("content-type", "application/json"))
        .and(header("user-agent", DEFAULT_USER_AGENT))
        .and(body_string(r#"{"name":"widget"}"#))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 7, "tags": []})))
        .expect(1)
        .mount(&server)
        .await;

    let controller = controller_for(&server, ClientSettings::default());
    let request = controller
        .new_request(HttpMethod::Post, "api/items?notify=false")
        .body(JsonBody::new(json!({"name": "widget"})))
        .build();
    let response = controller.send(request).await.unwrap();

    assert_eq!(response.status(), 201);
    assert_eq!(response.dictionary().unwrap()["id"], 7);
    assert!(response.redirected_from().is_none());
}

#[tokio::test]
async fn test_form_body_and_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/profile"))
        .and(header("authorization", "Bearer secret-token"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string("name=Ada+Lovelace&lang=en"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let controller = controller_for(&server, ClientSettings::default());
    controller
        .set_shared_credential(Some(Credential::with_token("secret-token")), false)
        .unwrap();

    let request = controller
        .new_request(HttpMethod::Put, "profile")
        .body(FormBody::new().field("name", "Ada Lovelace").field("lang", "en"))
        .build();
    assert_eq!(controller.send(request).await.unwrap().status(), 204);
}

#[tokio::test]
async fn test_get_sends_no_content_type() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .mount(&server)
        .await;

    let controller = controller_for(
        &server,
        ClientSettings::default().with_default_header("Content-Type", "application/json"),
    );
    let response = controller.get("search").await.unwrap();
    assert!(response.array().unwrap().is_empty());

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    assert!(received[0].headers.get("content-type").is_none());
    assert!(received[0].body.is_empty());
}

#[tokio::test]
async fn test_redirect_records_original_url() {
    let server = MockServer::start().await;
    Mock::given(path("/old"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/new"))
        .mount(&server)
        .await;
    Mock::given(path("/new"))
        .respond_with(ResponseTemplate::new(200).set_body_string("moved"))
        .mount(&server)
        .await;

    let controller = controller_for(&server, ClientSettings::default());
    let response = controller.get("old").await.unwrap();

    assert_eq!(response.text(), Some("moved"));
    assert_eq!(response.url().path(), "/new");
    assert_eq!(response.redirected_from().unwrap().path(), "/old");
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_not_found_can_be_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/status/404"))
        .respond_with(ResponseTemplate::new(404).set_body_string("missing"))
        .expect(2)
        .mount(&server)
        .await;

    let controller = controller_for(&server, ClientSettings::default());
    let failure = controller.get("status/404").await.unwrap_err();

    assert!(matches!(
        failure.error(),
        RequestError::Status { status: 404, reason } if reason == "Not Found"
    ));
    assert_eq!(failure.response().unwrap().text(), Some("missing"));
    assert_eq!(failure.recovery_options().len(), 2);

    assert!(failure.retry());
    tokio::time::timeout(Duration::from_secs(5), async {
        while server.received_requests().await.unwrap().len() < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("retry was not dispatched");
}

#[tokio::test]
async fn test_timeout_is_reported() {
    let server = MockServer::start().await;
    Mock::given(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let controller = controller_for(
        &server,
        ClientSettings::default().with_timeout(Duration::from_secs(1)),
    );
    let failure = controller.get("slow").await.unwrap_err();

    assert!(matches!(
        failure.error(),
        RequestError::Transport(TransportError::Timeout)
    ));
    assert!(failure.response().is_none());
}

#[tokio::test]
async fn test_unreachable_host_is_network_error() {
    let controller = RequestController::builder("http://127.0.0.1:9")
        .credential_store(CredentialStore::new(Arc::new(MemoryStore::new())))
        .build()
        .unwrap();

    let failure = controller.get("anything").await.unwrap_err();
    assert!(matches!(
        failure.error(),
        RequestError::Transport(TransportError::Network(_))
    ));
}

// ============================================================================
// Transfers
// ============================================================================

#[tokio::test]
async fn test_upload_streams_payload() {
    let server = MockServer::start().await;
    let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    Mock::given(method("POST"))
        .and(path("/uploads"))
        .and(body_bytes(payload.clone()))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let controller = controller_for(&server, ClientSettings::default());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();

    controller.upload_data(
        "uploads",
        payload.clone(),
        Some(Arc::new(move |p: courier_client::Progress| {
            let _ = progress_tx.send(p);
        })),
        move |result: Result<_, RequestFailure>| {
            let _ = tx.send(result.map(|r| r.status()).map_err(RequestFailure::into_error));
        },
    );

    assert_eq!(rx.recv().await.unwrap().unwrap(), 200);

    let mut last = None;
    while let Ok(progress) = progress_rx.try_recv() {
        last = Some(progress);
    }
    let last = last.expect("no progress reported");
    assert_eq!(last.transferred_bytes, payload.len() as u64);
    assert!((last.fraction - 1.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_download_streams_to_disk() {
    let server = MockServer::start().await;
    let content = "line\n".repeat(10_000);
    Mock::given(method("GET"))
        .and(path("/exports/latest"))
        .respond_with(ResponseTemplate::new(200).set_body_string(content.clone()))
        .mount(&server)
        .await;

    let controller = controller_for(&server, ClientSettings::default());
    let (tx, mut rx) = mpsc::unbounded_channel();
    controller.download("exports/latest", None, move |result| {
        let _ = tx.send(result.map_err(RequestFailure::into_error));
    });

    let download = rx.recv().await.unwrap().unwrap();
    assert_eq!(download.response.status(), 200);
    assert!(download.response.data().is_empty());
    assert_eq!(std::fs::read_to_string(download.location()).unwrap(), content);
    std::fs::remove_file(download.location()).unwrap();
}

#[tokio::test]
async fn test_failed_download_reports_status() {
    let server = MockServer::start().await;
    Mock::given(path("/exports/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let controller = controller_for(&server, ClientSettings::default());
    let (tx, mut rx) = mpsc::unbounded_channel();
    controller.download("exports/missing", None, move |result| {
        let _ = tx.send(result.map_err(RequestFailure::into_error));
    });

    let error = rx.recv().await.unwrap().unwrap_err();
    assert_eq!(error.status_code(), Some(404));
}
