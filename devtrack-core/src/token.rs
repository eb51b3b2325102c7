//! Bearer token inspection.
//!
//! This module provides:
//! - [`TokenClaims`] - Claims decoded from a token payload, *unverified*
//! - [`TokenInspector`] - Claim decoding and expiry checks against a [`Clock`]
//! - [`Clock`] - Injectable wall clock
//!
//! Decoded claims are advisory. They drive the "attach or not" decision and
//! what the UI displays, never an authorization decision; the server checks
//! signatures.
//!
//! # Expiry policy
//!
//! A token whose claims cannot be decoded, or that carries no `exp`, is
//! treated as expired. Expiry is compared against the current instant with
//! no clock-skew allowance: access tokens are short-lived, and a token that
//! expires in flight is recovered by the refresh protocol.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Role claim name used by ASP.NET identity backends.
const MS_ROLE_CLAIM: &str = "http://schemas.microsoft.com/ws/2008/06/identity/claims/role";

/// Source of the current instant.
pub trait Clock: Send + Sync {
    /// The current wall-clock instant.
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at a fixed instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Claims decoded from a bearer token without verifying its signature.
///
/// Derived on demand from the stored access token and never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Expiry as seconds since the Unix epoch.
    pub exp: Option<i64>,

    /// Issued-at as seconds since the Unix epoch.
    pub iat: Option<i64>,

    /// Subject (user identifier).
    pub sub: Option<String>,

    /// Email address, when the issuer includes it.
    pub email: Option<String>,

    /// Roles granted to the subject.
    pub roles: Vec<String>,

    /// Contractor (tenant) the subject belongs to.
    pub contractor_id: Option<String>,
}

impl TokenClaims {
    /// Build claims from a decoded JSON payload.
    ///
    /// Returns `None` if the payload is not a JSON object.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let object = payload.as_object()?;

        let roles = ["role", "roles", MS_ROLE_CLAIM]
            .iter()
            .find_map(|name| object.get(*name))
            .map(string_list)
            .unwrap_or_default();

        let contractor_id = ["contractorId", "contractor_id", "tenantId", "tenant_id"]
            .iter()
            .find_map(|name| object.get(*name))
            .and_then(scalar_string);

        Some(Self {
            exp: object.get("exp").and_then(epoch_seconds),
            iat: object.get("iat").and_then(epoch_seconds),
            sub: object.get("sub").and_then(scalar_string),
            email: object.get("email").and_then(scalar_string),
            roles,
            contractor_id,
        })
    }

    /// Expiry instant, if the token carries one.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| DateTime::from_timestamp(exp, 0))
    }

    /// Primary role, for display.
    pub fn role(&self) -> Option<&str> {
        self.roles.first().map(String::as_str)
    }
}

fn epoch_seconds(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|secs| secs.floor() as i64))
}

pub(crate) fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(scalar_string).collect(),
        other => scalar_string(other).into_iter().collect(),
    }
}

/// Decode the claims of a `header.payload[.signature]` token.
///
/// Returns `None` for anything structurally invalid: a missing payload
/// segment, bad base64url, or a payload that is not a JSON object.
pub fn decode_claims(token: &str) -> Option<TokenClaims> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let value: Value = serde_json::from_slice(&bytes).ok()?;
    TokenClaims::from_payload(&value)
}

/// Claim decoding and expiry checks against an injectable clock.
#[derive(Clone)]
pub struct TokenInspector {
    clock: Arc<dyn Clock>,
}

impl TokenInspector {
    /// Create an inspector reading time from `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Create an inspector on the system clock.
    pub fn system() -> Self {
        Self::new(Arc::new(SystemClock))
    }

    /// Decode the unverified claims of `token`.
    pub fn decode_claims(&self, token: &str) -> Option<TokenClaims> {
        decode_claims(token)
    }

    /// Whether `token` must be treated as expired.
    ///
    /// Fail-safe: undecodable tokens and tokens without `exp` are expired.
    pub fn is_expired(&self, token: &str) -> bool {
        match decode_claims(token).and_then(|claims| claims.exp) {
            Some(exp) => self.clock.now().timestamp_millis() >= exp.saturating_mul(1000),
            None => true,
        }
    }

    /// Time left before `token` expires; `None` when expired or undecodable.
    pub fn remaining(&self, token: &str) -> Option<Duration> {
        let expires_at = decode_claims(token)?.expires_at()?;
        let left = expires_at - self.clock.now();
        (left > Duration::zero()).then_some(left)
    }
}

impl Default for TokenInspector {
    fn default() -> Self {
        Self::system()
    }
}

impl std::fmt::Debug for TokenInspector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenInspector")
            .field("now", &self.clock.now())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mint(payload: Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{}.{}.signature", header, body)
    }

    fn inspector_at(secs: i64) -> TokenInspector {
        let now = DateTime::from_timestamp(secs, 0).unwrap();
        TokenInspector::new(Arc::new(FixedClock(now)))
    }

    #[test]
    fn test_decode_claims() {
        let token = mint(json!({
            "sub": "42",
            "exp": 1_900_000_000,
            "email": "crew@example.com",
            "http://schemas.microsoft.com/ws/2008/06/identity/claims/role": ["Contractor", "Admin"],
            "contractorId": 17
        }));

        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims.sub.as_deref(), Some("42"));
        assert_eq!(claims.exp, Some(1_900_000_000));
        assert_eq!(claims.email.as_deref(), Some("crew@example.com"));
        assert_eq!(claims.role(), Some("Contractor"));
        assert_eq!(claims.roles.len(), 2);
        assert_eq!(claims.contractor_id.as_deref(), Some("17"));
        assert_eq!(claims.expires_at().unwrap().timestamp(), 1_900_000_000);
    }

    #[test]
    fn test_decode_invalid_tokens() {
        assert!(decode_claims("").is_none());
        assert!(decode_claims("opaque-token").is_none());
        assert!(decode_claims("a.!!!.c").is_none());

        let not_object = format!("x.{}.y", URL_SAFE_NO_PAD.encode("[1,2]"));
        assert!(decode_claims(&not_object).is_none());
    }

    #[test]
    fn test_is_expired() {
        let inspector = inspector_at(1_000);

        assert!(!inspector.is_expired(&mint(json!({ "exp": 1_001 }))));
        assert!(inspector.is_expired(&mint(json!({ "exp": 1_000 }))));
        assert!(inspector.is_expired(&mint(json!({ "exp": 999 }))));
    }

    #[test]
    fn test_missing_expiry_is_expired() {
        let inspector = inspector_at(1_000);

        assert!(inspector.is_expired(&mint(json!({ "sub": "42" }))));
        assert!(inspector.is_expired("not-a-jwt"));
    }

    #[test]
    fn test_remaining() {
        let inspector = inspector_at(1_000);

        let remaining = inspector.remaining(&mint(json!({ "exp": 1_060 }))).unwrap();
        assert_eq!(remaining, Duration::seconds(60));
        assert!(inspector.remaining(&mint(json!({ "exp": 900 }))).is_none());
    }
}
