use mockito::{Matcher, Server};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use trustgrid::{
    auth::AuthClient,
    backend::{normalize_base_url, HttpBackend, ScanBackend},
    lifecycle::{Phase, ScanController},
    profile::{ScanProfile, ScannerKind},
    store::Store,
    types::{ScanRequest, ScanStart},
    ScanError,
};

fn backend_for(server: &Server) -> HttpBackend {
    let base = normalize_base_url(&server.url()).unwrap();
    HttpBackend::with_client(reqwest::Client::new(), base)
}

fn auth_for(server: &Server) -> AuthClient {
    let base = normalize_base_url(&server.url()).unwrap();
    AuthClient::new(reqwest::Client::new(), base)
}

#[tokio::test]
async fn test_start_polling_scan() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/webappscanner/scan/")
        .match_body(Matcher::Json(json!({ "target": "https://example.com" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"scan_id": "f3a9", "status": "started"}"#)
        .create_async()
        .await;

    let profile = ScanProfile::for_kind(ScannerKind::Webapp);
    let start = backend_for(&server)
        .start_scan(&profile, &ScanRequest::new(" https://example.com "))
        .await
        .unwrap();

    assert_eq!(start, ScanStart::Queued { scan_id: "f3a9".to_string() });
    mock.assert_async().await;
}

#[tokio::test]
async fn test_start_scan_rejected_with_message() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/apiscanner/scan/")
        .with_status(400)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error": "Target URL is required"}"#)
        .create_async()
        .await;

    let profile = ScanProfile::for_kind(ScannerKind::Api);
    let err = backend_for(&server)
        .start_scan(&profile, &ScanRequest::new("x"))
        .await
        .unwrap_err();

    assert!(matches!(err, ScanError::Backend { status: 400, .. }));
    assert_eq!(err.start_failure_message(), "Target URL is required");
}

#[tokio::test]
async fn test_start_scan_without_scan_id_is_malformed() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/webappscanner/scan/")
        .with_status(200)
        .with_body(r#"{"status": "started"}"#)
        .create_async()
        .await;

    let profile = ScanProfile::for_kind(ScannerKind::Webapp);
    let err = backend_for(&server)
        .start_scan(&profile, &ScanRequest::new("https://example.com"))
        .await
        .unwrap_err();

    assert!(matches!(err, ScanError::MalformedResponse(_)));
    assert_eq!(err.start_failure_message(), "Failed to start scan");
}

#[tokio::test]
async fn test_start_scan_rejects_unroutable_scan_id() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/webappscanner/scan/")
        .with_status(200)
        .with_body(r#"{"scan_id": "../download-pdf/other?x=1"}"#)
        .create_async()
        .await;
    let status = server
        .mock("GET", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let profile = ScanProfile::for_kind(ScannerKind::Webapp);
    let err = backend_for(&server)
        .start_scan(&profile, &ScanRequest::new("https://example.com"))
        .await
        .unwrap_err();

    assert!(matches!(err, ScanError::MalformedResponse(_)));
    assert_eq!(err.start_failure_message(), "Failed to start scan");
    status.assert_async().await;
}

#[tokio::test]
async fn test_network_scan_completes_inline() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/networkscanner/scan/")
        .match_body(Matcher::Json(json!({ "ip": "10.0.0.5", "ports": "22,80" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "results": [
                    { "host": "10.0.0.5", "port": 22, "status": "open", "service": "ssh" },
                    { "host": "10.0.0.5", "port": 80, "status": "closed", "service": "http" }
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let profile = ScanProfile::for_kind(ScannerKind::Network);
    let start = backend_for(&server)
        .start_scan(&profile, &ScanRequest::new("10.0.0.5").with_ports("22,80"))
        .await
        .unwrap();

    match start {
        ScanStart::Completed { results } => {
            assert_eq!(results.len(), 2);
            assert_eq!(results[0].field("port"), "22");
            assert_eq!(results[1].field("service"), "http");
        }
        other => panic!("expected inline results, got {:?}", other),
    }
    mock.assert_async().await;
}

#[tokio::test]
async fn test_status_parsing_and_error_responses() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/webappscanner/status/ok/")
        .with_status(200)
        .with_body(
            json!({
                "status": "running",
                "progress": [
                    { "stage": "open_url", "status": "done" },
                    { "stage": "spider", "status": "55%" }
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;
    server
        .mock("GET", "/api/webappscanner/status/broken/")
        .with_status(500)
        .with_body(r#"{"status": "error", "details": "ZAP unreachable"}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/api/webappscanner/status/gateway/")
        .with_status(502)
        .with_body("<html>Bad Gateway</html>")
        .create_async()
        .await;

    let profile = ScanProfile::for_kind(ScannerKind::Webapp);
    let backend = backend_for(&server);

    let report = backend.scan_status(&profile, "ok").await.unwrap();
    assert_eq!(report.status, "running");
    assert_eq!(report.progress.len(), 2);
    assert_eq!(report.progress[1].status, "55%");

    // An error status is still a usable answer even on a 5xx.
    let report = backend.scan_status(&profile, "broken").await.unwrap();
    assert_eq!(report.error_detail(), "ZAP unreachable");

    let err = backend.scan_status(&profile, "gateway").await.unwrap_err();
    assert!(matches!(err, ScanError::Backend { status: 502, .. }));
}

#[tokio::test]
async fn test_results_endpoint() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/apiscanner/results/a1/")
        .with_status(200)
        .with_body(
            json!({ "results": [{ "alert": "Broken auth", "priority": "High", "cve": null }] })
                .to_string(),
        )
        .create_async()
        .await;
    server
        .mock("GET", "/api/apiscanner/results/7/")
        .with_status(404)
        .with_header("content-type", "text/html")
        .with_body("<html>Not Found</html>")
        .create_async()
        .await;
    server
        .mock("GET", "/api/apiscanner/results/8/")
        .with_status(500)
        .with_body(r#"{"error": "Scan not finished"}"#)
        .create_async()
        .await;

    let profile = ScanProfile::for_kind(ScannerKind::Api);
    let backend = backend_for(&server);
    let results = backend.scan_results(&profile, "a1").await.unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].field("priority"), "High");
    assert_eq!(results[0].field("cve"), "-");

    // HTML error pages keep their status code.
    match backend.scan_results(&profile, "7").await.unwrap_err() {
        ScanError::Backend { status, message } => {
            assert_eq!(status, 404);
            assert!(message.is_empty());
        }
        other => panic!("unexpected error: {:?}", other),
    }

    match backend.scan_results(&profile, "8").await.unwrap_err() {
        ScanError::Backend { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "Scan not finished");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_report_downloads() {
    let mut server = Server::new_async().await;
    let keyed = server
        .mock("GET", "/api/webappscanner/download-pdf/a1/")
        .with_status(200)
        .with_header("content-type", "application/pdf")
        .with_body("%PDF-1.4 webapp")
        .create_async()
        .await;
    let repost = server
        .mock("POST", "/api/domainscanner/scan/")
        .match_body(Matcher::Json(json!({ "domain": "example.com", "download_pdf": true })))
        .with_status(200)
        .with_body("%PDF-1.4 domain")
        .create_async()
        .await;
    server
        .mock("GET", "/api/networkscanner/download-pdf/")
        .with_status(404)
        .create_async()
        .await;

    let backend = backend_for(&server);

    let web = ScanProfile::for_kind(ScannerKind::Webapp);
    let bytes = backend
        .fetch_report(&web, Some("a1"), &ScanRequest::new("https://example.com"))
        .await
        .unwrap();
    assert_eq!(bytes, b"%PDF-1.4 webapp");

    let domain = ScanProfile::for_kind(ScannerKind::Domain);
    let bytes = backend
        .fetch_report(&domain, None, &ScanRequest::new("example.com"))
        .await
        .unwrap();
    assert_eq!(bytes, b"%PDF-1.4 domain");

    let network = ScanProfile::for_kind(ScannerKind::Network);
    let err = backend
        .fetch_report(&network, None, &ScanRequest::new("10.0.0.5"))
        .await
        .unwrap_err();
    assert!(matches!(err, ScanError::Backend { status: 404, .. }));

    let ssl = ScanProfile::for_kind(ScannerKind::Ssl);
    assert!(backend
        .fetch_report(&ssl, None, &ScanRequest::new("example.com"))
        .await
        .is_err());

    keyed.assert_async().await;
    repost.assert_async().await;
}

#[tokio::test]
async fn test_bearer_token_attached() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/apiscanner/status/t1/")
        .match_header("authorization", "Bearer secret-token")
        .with_status(200)
        .with_body(r#"{"status": "running"}"#)
        .create_async()
        .await;

    let profile = ScanProfile::for_kind(ScannerKind::Api);
    let backend = backend_for(&server).with_token(Some("secret-token".to_string()));
    backend.scan_status(&profile, "t1").await.unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_controller_over_http_polls_until_finished() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/webappscanner/scan/")
        .with_status(200)
        .with_body(r#"{"scan_id": "e2e"}"#)
        .create_async()
        .await;
    let status = server
        .mock("GET", "/api/webappscanner/status/e2e/")
        .with_status(200)
        .with_body(
            json!({
                "status": "finished",
                "progress": [{ "stage": "spider", "status": "done" }],
                "results": [{ "alert": "Cookie without Secure flag", "risk": "Low" }]
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let profile =
        ScanProfile::for_kind(ScannerKind::Webapp).with_poll_interval(Duration::from_millis(10));
    let store = Store::default();
    let (mut controller, mut events) =
        ScanController::new(profile, Arc::new(backend_for(&server)), store.clone());

    controller.submit(ScanRequest::new("https://example.com")).await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(event) = events.recv().await {
            if event.is_terminal() {
                break;
            }
        }
    })
    .await
    .unwrap();

    // Give a stray extra tick a chance to show up before checking the count.
    tokio::time::sleep(Duration::from_millis(50)).await;
    status.assert_async().await;

    let state = controller.snapshot();
    assert_eq!(state.phase, Phase::Finished);
    assert_eq!(state.progress.get("spider"), Some(100));
    assert_eq!(state.results[0].field("alert"), "Cookie without Secure flag");
    assert!(!store.is_scan_running());
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_login_accepts_both_token_layouts() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/accounts/login/")
        .match_body(Matcher::PartialJson(json!({ "username": "alice" })))
        .with_status(200)
        .with_body(r#"{"user": {"id": 1}, "tokens": {"access": "A1", "refresh": "R1"}}"#)
        .create_async()
        .await;
    server
        .mock("POST", "/api/accounts/login/")
        .match_body(Matcher::PartialJson(json!({ "username": "bob" })))
        .with_status(200)
        .with_body(r#"{"access": "A2", "refresh": "R2"}"#)
        .create_async()
        .await;

    let auth = auth_for(&server);

    let alice = auth.login("alice", "pw").await.unwrap();
    assert_eq!(alice.access, "A1");
    assert_eq!(alice.refresh, "R1");

    let bob = auth.login("bob", "pw").await.unwrap();
    assert_eq!(bob.access, "A2");
}

#[tokio::test]
async fn test_login_rejected() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/accounts/login/")
        .with_status(401)
        .with_body(r#"{"detail": "No active account found with the given credentials"}"#)
        .create_async()
        .await;

    let err = auth_for(&server).login("mallory", "nope").await.unwrap_err();
    match err {
        ScanError::AuthenticationFailed(message) => {
            assert_eq!(message, "No active account found with the given credentials")
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_register_reports_validation_errors() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/accounts/register/")
        .match_body(Matcher::Json(json!({
            "username": "alice",
            "email": "alice@example.com",
            "password": "pw"
        })))
        .with_status(400)
        .with_body(r#"{"username": ["A user with that username already exists."]}"#)
        .create_async()
        .await;

    let err = auth_for(&server)
        .register("alice", "alice@example.com", "pw")
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Backend returned 400: username: A user with that username already exists."
    );
}

#[tokio::test]
async fn test_current_user_with_stale_token() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/accounts/user/")
        .match_header("authorization", "Bearer good")
        .with_status(200)
        .with_body(r#"{"id": 1, "username": "alice"}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/api/accounts/user/")
        .match_header("authorization", "Bearer stale")
        .with_status(401)
        .create_async()
        .await;

    let auth = auth_for(&server);

    let user = auth.current_user("good").await.unwrap();
    assert_eq!(user["username"], "alice");

    let err = auth.current_user("stale").await.unwrap_err();
    assert!(matches!(err, ScanError::AuthenticationFailed(_)));
}
