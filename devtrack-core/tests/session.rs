//! Integration tests for the session lifecycle.
//!
//! These tests verify that:
//! - Login persists both tokens or neither
//! - Refresh persists the new access token and keeps an unrotated refresh token
//! - Logout clears local state whatever the server does
//! - Stored sessions are re-validated on restore

mod common;

use common::{client_for, seed, valid_token};
use devtrack_core::{DevtrackClient, ErrorKind};
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, method, path},
};

#[tokio::test]
async fn test_login_stores_credential_pair() {
    let server = MockServer::start().await;
    let client = client_for(&server);
    let access = valid_token("crew-1");

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({ "email": "crew@example.com", "password": "hunter2" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accessToken": access,
            "refreshToken": "refresh-1",
            "user": { "id": "u-1", "email": "crew@example.com", "roles": ["Contractor"] }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = client
        .auth()
        .login("crew@example.com", "hunter2")
        .await
        .unwrap();

    assert_eq!(response.user.unwrap().roles, vec!["Contractor".to_string()]);
    assert_eq!(client.store().access_token().await.unwrap().expose(), access);
    assert_eq!(
        client.store().refresh_token().await.unwrap().expose(),
        "refresh-1"
    );
    assert!(client.auth().is_authenticated().await);
    assert_eq!(
        client.auth().current_claims().await.unwrap().sub.as_deref(),
        Some("crew-1")
    );
}

#[tokio::test]
async fn test_login_tolerates_loosely_typed_profile() {
    let server = MockServer::start().await;
    let client = client_for(&server);
    let access = valid_token("crew-7");

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accessToken": access,
            "refreshToken": "refresh-7",
            "user": { "id": 7, "email": "crew@example.com", "roles": null }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = client
        .auth()
        .login("crew@example.com", "hunter2")
        .await
        .unwrap();

    let user = response.user.unwrap();
    assert_eq!(user.id.as_deref(), Some("7"));
    assert!(user.roles.is_empty());
    assert_eq!(client.store().access_token().await.unwrap().expose(), access);
    assert_eq!(
        client.store().refresh_token().await.unwrap().expose(),
        "refresh-7"
    );
}

#[tokio::test]
async fn test_login_drops_unreadable_profile() {
    let server = MockServer::start().await;
    let client = client_for(&server);

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accessToken": valid_token("crew-7"),
            "refreshToken": "refresh-7",
            "user": "crew@example.com"
        })))
        .mount(&server)
        .await;

    let response = client
        .auth()
        .login("crew@example.com", "hunter2")
        .await
        .unwrap();

    assert!(response.user.is_none());
    assert!(client.auth().is_authenticated().await);
}

#[tokio::test]
async fn test_login_validates_before_network() {
    let server = MockServer::start().await;
    let client = client_for(&server);

    for (email, password) in [("", "hunter2"), ("crew@example.com", ""), ("  ", "  ")] {
        let err = client.auth().login(email, password).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::ValidationError);
    }

    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_login_missing_refresh_token_stores_nothing() {
    let server = MockServer::start().await;
    let client = client_for(&server);

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "accessToken": valid_token("crew-1") })),
        )
        .mount(&server)
        .await;

    let err = client
        .auth()
        .login("crew@example.com", "hunter2")
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Unknown);
    assert!(client.store().access_token().await.is_none());
    assert!(client.store().refresh_token().await.is_none());
}

#[tokio::test]
async fn test_refresh_keeps_unrotated_refresh_token() {
    let server = MockServer::start().await;
    let client = client_for(&server);
    seed(&client, "old-access", "refresh-1").await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .and(body_json(json!({ "refreshToken": "refresh-1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "accessToken": "new-access" })))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = client.auth().refresh().await.unwrap();

    assert_eq!(tokens.access_token.expose(), "new-access");
    assert!(tokens.refresh_token.is_none());
    assert_eq!(
        client.store().access_token().await.unwrap().expose(),
        "new-access"
    );
    assert_eq!(
        client.store().refresh_token().await.unwrap().expose(),
        "refresh-1"
    );
}

#[tokio::test]
async fn test_refresh_stores_rotated_refresh_token() {
    let server = MockServer::start().await;
    let client = client_for(&server);
    seed(&client, "old-access", "refresh-1").await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "new-access",
            "refresh_token": "refresh-2"
        })))
        .mount(&server)
        .await;

    client.auth().refresh().await.unwrap();

    assert_eq!(
        client.store().refresh_token().await.unwrap().expose(),
        "refresh-2"
    );
}

#[tokio::test]
async fn test_refresh_without_stored_token_is_unauthorized() {
    let server = MockServer::start().await;
    let client = client_for(&server);

    let err = client.auth().refresh().await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::Unauthorized);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_logout_clears_even_when_server_fails() {
    let server = MockServer::start().await;
    let client = client_for(&server);
    seed(&client, &valid_token("crew-1"), "refresh-1").await;

    Mock::given(method("POST"))
        .and(path("/api/auth/logout"))
        .and(body_json(json!({ "refreshToken": "refresh-1" })))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    client.auth().logout().await;

    assert!(client.store().access_token().await.is_none());
    assert!(client.store().refresh_token().await.is_none());
    assert!(!client.auth().is_authenticated().await);
}

#[tokio::test]
async fn test_logout_clears_when_unreachable() {
    let client = DevtrackClient::builder("http://127.0.0.1:9/api")
        .build()
        .unwrap();
    seed(&client, &valid_token("crew-1"), "refresh-1").await;

    client.auth().logout().await;

    assert!(client.store().access_token().await.is_none());
    assert!(client.store().refresh_token().await.is_none());
}

#[tokio::test]
async fn test_restore_session() {
    let server = MockServer::start().await;
    let client = client_for(&server);

    assert!(!client.auth().restore_session().await);

    seed(&client, "old-access", "refresh-1").await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "accessToken": "new-access" })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    assert!(client.auth().restore_session().await);

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    assert!(!client.auth().restore_session().await);
    assert!(client.store().access_token().await.is_none());
    assert!(client.store().refresh_token().await.is_none());
}
