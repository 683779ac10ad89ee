//! Integration tests for the 401 → refresh → replay protocol.
//!
//! Every test runs the real client against a wiremock server: API routes
//! answer 200 only for the expected bearer token and 401 otherwise.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use backoffice_session::{
    ApiRequest, RefreshError, SessionClient, SessionConfig, SessionError, SessionState,
    strategy_fn,
};
use backoffice_types::{AccessToken, SessionStatus};
use futures_util::future::join_all;
use reqwest::StatusCode;
use serde_json::{Value, json};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn client_for(server: &MockServer) -> SessionClient {
    init_tracing();
    let config = SessionConfig::new(&server.uri()).unwrap();
    SessionClient::new(config, Arc::new(SessionState::new())).unwrap()
}

/// `GET {route}` answers 200 for `Bearer {token}` and 401 for anything else.
async fn mount_protected(
    server: &MockServer,
    route: &str,
    token: &str,
    ok_hits: u64,
    unauthorized_hits: u64,
) {
    Mock::given(method("GET"))
        .and(path(route))
        .and(header("authorization", format!("Bearer {token}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .with_priority(1)
        .expect(ok_hits)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(401))
        .with_priority(5)
        .expect(unauthorized_hits)
        .mount(server)
        .await;
}

async fn mount_refresh(server: &MockServer, template: ResponseTemplate, hits: u64) {
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(template)
        .expect(hits)
        .mount(server)
        .await;
}

#[tokio::test]
async fn replays_with_refreshed_token_when_starting_without_one() {
    let server = MockServer::start().await;
    mount_protected(&server, "/profile", "abc", 1, 1).await;
    mount_refresh(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({"accessToken": "abc"})),
        1,
    )
    .await;

    let client = client_for(&server);
    client.set_access_token("");

    let body: Value = client
        .send_json(ApiRequest::get("/profile"))
        .await
        .unwrap();

    assert_eq!(body, json!({"ok": true}));
    assert_eq!(client.access_token().unwrap().expose_secret(), "abc");

    let requests = server.received_requests().await.unwrap();
    let first = &requests[0];
    assert!(first.headers.get("authorization").is_none());
    let replay = requests.last().unwrap();
    assert_eq!(replay.headers.get("authorization").unwrap(), "Bearer abc");
}

#[tokio::test]
async fn concurrent_unauthorized_requests_share_one_refresh() {
    let server = MockServer::start().await;
    mount_protected(&server, "/orders", "fresh", 5, 5).await;
    mount_refresh(
        &server,
        ResponseTemplate::new(200)
            .set_body_json(json!({"accessToken": "fresh"}))
            .set_delay(Duration::from_millis(200)),
        1,
    )
    .await;

    let client = client_for(&server);
    client.set_access_token("stale");

    let results = join_all((0..5).map(|_| client.send(ApiRequest::get("/orders")))).await;

    for result in results {
        assert_eq!(result.unwrap().status(), StatusCode::OK);
    }
    assert!(!client.is_refreshing());
    assert_eq!(client.queued_waiters(), 0);
    assert_eq!(client.access_token().unwrap().expose_secret(), "fresh");
}

#[tokio::test]
async fn second_unauthorized_is_final() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/invoices"))
        .respond_with(ResponseTemplate::new(401).set_body_string("token revoked"))
        .expect(2)
        .mount(&server)
        .await;
    mount_refresh(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({"accessToken": "fresh"})),
        1,
    )
    .await;

    let client = client_for(&server);
    client.set_access_token("stale");

    let err = client.send(ApiRequest::get("/invoices")).await.unwrap_err();
    match err {
        SessionError::RequestFailed { status, body } => {
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body, "token revoked");
        }
        other => panic!("expected RequestFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn failed_refresh_rejects_every_waiter_and_signs_out() {
    let server = MockServer::start().await;
    mount_protected(&server, "/todos", "never", 0, 3).await;
    mount_refresh(
        &server,
        ResponseTemplate::new(500).set_delay(Duration::from_millis(100)),
        1,
    )
    .await;

    let client = client_for(&server);
    client.set_access_token("stale");
    let mut status = client.session().subscribe();

    let results = join_all((0..3).map(|_| client.send(ApiRequest::get("/todos")))).await;

    for result in results {
        match result {
            Err(SessionError::AuthExpired(RefreshError::Status { status })) => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            }
            other => panic!("expected AuthExpired, got {other:?}"),
        }
    }
    assert!(client.access_token().is_none());
    assert!(status.has_changed().unwrap());
    assert_eq!(*status.borrow_and_update(), SessionStatus::SignedOut);
}

#[tokio::test]
async fn unauthorized_refresh_endpoint_is_not_refreshed() {
    let server = MockServer::start().await;
    mount_refresh(&server, ResponseTemplate::new(401), 1).await;

    let client = client_for(&server);
    let err = client
        .send(ApiRequest::post("/auth/refresh"))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
}

#[tokio::test]
async fn other_failures_propagate_unchanged() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/products/404"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such product"))
        .expect(1)
        .mount(&server)
        .await;
    mount_refresh(&server, ResponseTemplate::new(200), 0).await;

    let client = client_for(&server);
    client.set_access_token("valid");

    let err = client
        .send(ApiRequest::get("/products/404"))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(StatusCode::NOT_FOUND));
    assert_eq!(client.access_token().unwrap().expose_secret(), "valid");
}

#[tokio::test]
async fn custom_strategy_replaces_http_refresh() {
    let server = MockServer::start().await;
    mount_protected(&server, "/calendar", "custom", 1, 1).await;
    mount_refresh(&server, ResponseTemplate::new(500), 0).await;

    let calls = Arc::new(AtomicUsize::new(0));
    let client = client_for(&server);
    let counter = Arc::clone(&calls);
    client.set_refresh_strategy(strategy_fn(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        async { Ok::<_, RefreshError>(AccessToken::new("custom").unwrap()) }
    }));

    let response = client.send(ApiRequest::get("/calendar")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn hung_refresh_times_out_when_configured() {
    let server = MockServer::start().await;
    mount_protected(&server, "/chat", "late", 0, 1).await;

    init_tracing();
    let config = SessionConfig::new(&server.uri())
        .unwrap()
        .with_refresh_timeout(Some(Duration::from_millis(50)));
    let client = SessionClient::new(config, Arc::new(SessionState::new())).unwrap();
    client.set_refresh_strategy(strategy_fn(|| async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok::<_, RefreshError>(AccessToken::new("late").unwrap())
    }));

    let err = client.send(ApiRequest::get("/chat")).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::AuthExpired(RefreshError::TimedOut(_))
    ));
    assert!(!client.is_refreshing());
}

#[tokio::test]
async fn request_carrying_outdated_token_replays_without_new_refresh() {
    let server = MockServer::start().await;
    mount_protected(&server, "/complaints", "fresh", 1, 0).await;
    mount_refresh(&server, ResponseTemplate::new(200), 0).await;

    let client = Arc::new(client_for(&server));
    client.set_access_token("stale");

    // The 401 comes back slowly; the token rotates while it is in flight.
    Mock::given(method("GET"))
        .and(path("/complaints"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401).set_delay(Duration::from_millis(150)))
        .with_priority(2)
        .expect(1)
        .mount(&server)
        .await;

    let pending = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.send(ApiRequest::get("/complaints")).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    client.set_access_token("fresh");

    let response = pending.await.unwrap().unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn login_stores_token_and_user() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(wiremock::matchers::body_json(
            json!({"email": "ops@example.com", "password": "hunter2"}),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accessToken": "t1",
            "user": {"id": 3, "email": "ops@example.com"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_protected(&server, "/me", "t1", 1, 0).await;

    let client = client_for(&server);
    let user = client
        .login(&backoffice_types::Credentials::new(
            "ops@example.com",
            "hunter2",
        ))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(user.email(), Some("ops@example.com"));
    assert_eq!(client.session().status(), SessionStatus::SignedIn);
    client.send(ApiRequest::get("/me")).await.unwrap();
}

#[tokio::test]
async fn login_without_token_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"user": {}})))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .login(&backoffice_types::Credentials::new("a@b.c", "x"))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::MissingToken));
    assert!(client.access_token().is_none());
}

#[tokio::test]
async fn logout_clears_session_even_when_server_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .and(|request: &Request| request.headers.contains_key("authorization"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    client.set_access_token("t1");
    client.logout().await;

    assert!(client.access_token().is_none());
    assert_eq!(client.session().status(), SessionStatus::SignedOut);
}

#[tokio::test]
async fn restore_reports_whether_a_session_exists() {
    let server = MockServer::start().await;
    mount_refresh(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({
            "accessToken": "restored",
            "user": {"email": "ops@example.com"}
        })),
        1,
    )
    .await;

    let client = client_for(&server);
    assert!(client.restore().await);
    assert_eq!(client.access_token().unwrap().expose_secret(), "restored");
    assert_eq!(
        client.session().user().unwrap().email(),
        Some("ops@example.com")
    );
}

#[tokio::test]
async fn restore_without_cookie_stays_signed_out() {
    let server = MockServer::start().await;
    mount_refresh(&server, ResponseTemplate::new(401), 1).await;

    let client = client_for(&server);
    assert!(!client.restore().await);
    assert!(client.access_token().is_none());
}
