//! Integration tests for credential attachment and transparent refresh.
//!
//! These tests verify that the transport correctly:
//! - Attaches only live access tokens, and never to auth endpoints
//! - Renews on 401 with a single exchange shared by concurrent callers
//! - Replays a rejected call at most once
//! - Shares one exchange between an explicit refresh and a rejected call
//! - Clears the session and notifies once when renewal fails

mod common;

use common::{
    authorization, client_for, contractor_body, count_unauthorized, expired_token, seed,
    valid_token,
};
use devtrack_core::{DevtrackClient, ErrorKind, RequestDescriptor};
use futures::future::join_all;
use serde_json::json;
use std::sync::atomic::Ordering;
use std::time::Duration;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, header, method, path},
};

#[tokio::test]
async fn test_live_token_is_attached() {
    let server = MockServer::start().await;
    let client = client_for(&server);
    let token = valid_token("crew-1");
    seed(&client, &token, "refresh-1").await;

    Mock::given(method("GET"))
        .and(path("/api/contractors/me"))
        .and(header("authorization", format!("Bearer {}", token).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(contractor_body()))
        .expect(1)
        .mount(&server)
        .await;

    let contractor = client.contractors().current_contractor().await.unwrap();
    assert_eq!(contractor.contractor_id, 42);
    assert_eq!(contractor.contractor_name, "Northwind Installs");
}

#[tokio::test]
async fn test_expired_or_absent_token_is_not_attached() {
    let server = MockServer::start().await;
    let client = client_for(&server);

    Mock::given(method("GET"))
        .and(path("/api/contractors/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(contractor_body()))
        .expect(2)
        .mount(&server)
        .await;

    client.contractors().current_contractor().await.unwrap();

    seed(&client, &expired_token("crew-1"), "refresh-1").await;
    client.contractors().current_contractor().await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|r| authorization(r).is_none()));
}

#[tokio::test]
async fn test_auth_endpoints_are_exempt() {
    let server = MockServer::start().await;
    let client = client_for(&server);
    seed(&client, &valid_token("crew-1"), "refresh-1").await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "message": "Invalid credentials." })),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = client
        .auth()
        .login("crew@example.com", "wrong")
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Unauthorized);
    assert_eq!(err.status, Some(401));
    assert_eq!(err.message, "Invalid credentials.");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(authorization(&requests[0]).is_none());
}

#[tokio::test]
async fn test_logout_rejection_is_not_renewed() {
    let server = MockServer::start().await;
    let client = client_for(&server);
    seed(&client, &valid_token("crew-1"), "refresh-1").await;
    let notified = count_unauthorized(&client);

    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    client.auth().logout().await;

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(authorization(&requests[0]).is_none());
    assert!(client.store().access_token().await.is_none());
    assert_eq!(notified.load(Ordering::SeqCst), 0);
    assert_eq!(client.auth().transport().coordinator().cycles(), 0);
}

#[tokio::test]
async fn test_refresh_endpoint_rejection_is_not_renewed() {
    let server = MockServer::start().await;
    let client = client_for(&server);
    seed(&client, &valid_token("crew-1"), "refresh-1").await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let request = RequestDescriptor::post("/auth/refresh")
        .json(&json!({ "refreshToken": "refresh-1" }))
        .unwrap();
    let err = client.auth().transport().execute(request).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Unauthorized);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(authorization(&requests[0]).is_none());
    assert!(client.store().refresh_token().await.is_some());
    assert_eq!(client.auth().transport().coordinator().cycles(), 0);
}

#[tokio::test]
async fn test_explicit_refresh_shares_exchange_with_rejected_call() {
    let server = MockServer::start().await;
    let client = client_for(&server);
    let fresh = valid_token("crew-1-renewed");
    seed(&client, &valid_token("crew-1"), "refresh-1").await;
    let notified = count_unauthorized(&client);

    Mock::given(method("GET"))
        .and(path("/api/contractors/me"))
        .and(header("authorization", format!("Bearer {}", fresh).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(contractor_body()))
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/contractors/me"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "accessToken": fresh }))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (refreshed, contractor) = tokio::join!(client.auth().refresh(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        client.contractors().current_contractor().await
    });

    assert_eq!(refreshed.unwrap().access_token.expose(), fresh);
    assert_eq!(contractor.unwrap().contractor_id, 42);
    assert_eq!(client.store().access_token().await.unwrap().expose(), fresh);
    assert_eq!(notified.load(Ordering::SeqCst), 0);
    assert_eq!(client.auth().transport().coordinator().cycles(), 1);
}

#[tokio::test]
async fn test_concurrent_401s_share_one_refresh() {
    let server = MockServer::start().await;
    let client = client_for(&server);
    let stale = valid_token("crew-1");
    let fresh = valid_token("crew-1-renewed");
    seed(&client, &stale, "refresh-1").await;
    let notified = count_unauthorized(&client);

    Mock::given(method("GET"))
        .and(path("/api/contractors/me"))
        .and(header("authorization", format!("Bearer {}", fresh).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(contractor_body()))
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/contractors/me"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .and(body_json(json!({ "refreshToken": "refresh-1" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "accessToken": fresh }))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let results = join_all((0..5).map(|_| client.contractors().current_contractor())).await;

    for result in results {
        assert_eq!(result.unwrap().contractor_id, 42);
    }
    assert_eq!(client.store().access_token().await.unwrap().expose(), fresh);
    assert_eq!(
        client.store().refresh_token().await.unwrap().expose(),
        "refresh-1"
    );
    assert_eq!(notified.load(Ordering::SeqCst), 0);
    assert_eq!(client.auth().transport().coordinator().cycles(), 1);
}

#[tokio::test]
async fn test_replay_happens_at_most_once() {
    let server = MockServer::start().await;
    let client = client_for(&server);
    seed(&client, &valid_token("crew-1"), "refresh-1").await;

    Mock::given(method("GET"))
        .and(path("/api/contractors/me"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "accessToken": valid_token("crew-1") })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = client.contractors().current_contractor().await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Unauthorized);
}

#[tokio::test]
async fn test_failed_refresh_rejects_all_and_logs_out() {
    let server = MockServer::start().await;
    let client = client_for(&server);
    seed(&client, &valid_token("crew-1"), "refresh-revoked").await;
    let notified = count_unauthorized(&client);

    Mock::given(method("GET"))
        .and(path("/api/contractors/me"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_json(json!({ "message": "Refresh store offline." }))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let results = join_all((0..3).map(|_| client.contractors().current_contractor())).await;

    for result in results {
        let err = result.unwrap_err();
        assert_eq!(err.kind, ErrorKind::ServerError);
        assert_eq!(err.message, "Refresh store offline.");
    }
    assert!(client.store().access_token().await.is_none());
    assert!(client.store().refresh_token().await.is_none());
    assert_eq!(notified.load(Ordering::SeqCst), 1);
    assert!(!client.auth().transport().coordinator().is_refreshing());
}

#[tokio::test]
async fn test_other_failures_are_not_retried() {
    let server = MockServer::start().await;
    let client = client_for(&server);
    seed(&client, &valid_token("crew-1"), "refresh-1").await;

    Mock::given(method("GET"))
        .and(path("/api/contractors/me"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({ "title": "Forbidden" })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = client.contractors().current_contractor().await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Forbidden);
    assert_eq!(err.message, "Forbidden");
}

#[tokio::test]
async fn test_timeout_is_reported() {
    let server = MockServer::start().await;
    let client = DevtrackClient::builder(format!("{}/api", server.uri()))
        .timeout(Duration::from_millis(100))
        .build()
        .unwrap();

    Mock::given(method("GET"))
        .and(path("/api/contractors/me"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(contractor_body())
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let err = client.contractors().current_contractor().await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Timeout);
    assert_eq!(err.status, None);
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    let client = DevtrackClient::builder("http://127.0.0.1:9/api")
        .build()
        .unwrap();

    let err = client.contractors().current_contractor().await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NetworkError);
}
