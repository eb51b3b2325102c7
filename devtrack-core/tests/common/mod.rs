//! Shared helpers for the integration tests.

#![allow(dead_code)]

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use devtrack_core::{DevtrackClient, Secret};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use wiremock::MockServer;

/// Build an unsigned JWT around `claims`.
pub fn mint(claims: Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{}.signature", header, payload)
}

/// A token that expires an hour from now.
pub fn valid_token(sub: &str) -> String {
    mint(json!({
        "sub": sub,
        "exp": (Utc::now() + Duration::hours(1)).timestamp(),
    }))
}

/// A token that expired an hour ago.
pub fn expired_token(sub: &str) -> String {
    mint(json!({
        "sub": sub,
        "exp": (Utc::now() - Duration::hours(1)).timestamp(),
    }))
}

/// A client rooted at `{server}/api` with an in-memory store.
pub fn client_for(server: &MockServer) -> DevtrackClient {
    DevtrackClient::builder(format!("{}/api", server.uri()))
        .build()
        .unwrap()
}

/// Seed the stored credential pair.
pub async fn seed(client: &DevtrackClient, access_token: &str, refresh_token: &str) {
    client
        .store()
        .store_pair(&Secret::new(access_token), &Secret::new(refresh_token))
        .await;
}

/// Register an unauthorized hook that counts its invocations.
pub fn count_unauthorized(client: &DevtrackClient) -> Arc<AtomicUsize> {
    let count = Arc::new(AtomicUsize::new(0));
    let counter = count.clone();
    client.auth().on_unauthorized(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    count
}

/// A contractor profile body.
pub fn contractor_body() -> Value {
    json!({
        "contractorId": 42,
        "contractorName": "Northwind Installs",
        "contactPhone": "555-0100"
    })
}

/// The `Authorization` header of a received request, if any.
pub fn authorization(request: &wiremock::Request) -> Option<String> {
    request
        .headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}
