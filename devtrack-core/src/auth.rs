//! Login, refresh and logout.
//!
//! [`AuthService`] is the session API the UI layer talks to. It validates
//! input locally, drives the auth endpoints through the transport (they are
//! exempt from credentials and refresh), and keeps the credential pair in
//! the [`CredentialStore`] consistent:
//!
//! - login writes both tokens or neither
//! - refresh writes the new access token, and the refresh token only when
//!   the backend rotated it
//! - logout always clears both, whatever the server says

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::refresh::RefreshedTokens;
use crate::store::{CredentialStore, Secret};
use crate::token::{TokenClaims, TokenInspector, scalar_string, string_list};
use crate::transport::{ApiTransport, RequestDescriptor};

/// Login endpoint, relative to the base URL.
pub const LOGIN_PATH: &str = "/auth/login";

/// Logout endpoint, relative to the base URL.
pub const LOGOUT_PATH: &str = "/auth/logout";

#[derive(Debug, Clone, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct LogoutRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginPayload {
    #[serde(default, alias = "access_token")]
    access_token: Option<String>,

    #[serde(default, alias = "refresh_token")]
    refresh_token: Option<String>,

    #[serde(default)]
    user: Option<Value>,
}

impl LoginPayload {
    /// The profile, if present and readable. A malformed profile is dropped
    /// rather than failing the login.
    fn profile(&mut self) -> Option<AuthUser> {
        let value = self.user.take().filter(|value| !value.is_null())?;
        match serde_json::from_value(value) {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::warn!("Ignoring unreadable user profile in login response: {}", e);
                None
            }
        }
    }
}

/// The user profile optionally returned by login.
///
/// Decoded leniently: ids may be strings or numbers, and any field may be
/// missing or null.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub roles: Vec<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_approved: Option<bool>,
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(scalar_string(&Value::deserialize(deserializer)?))
}

fn lenient_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(string_list(&Value::deserialize(deserializer)?))
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(flag) => Some(flag),
        Value::String(s) => s.parse().ok(),
        _ => None,
    })
}

/// A successful login, already persisted.
#[derive(Debug, Clone)]
pub struct LoginResponse {
    pub access_token: Secret,
    pub refresh_token: Secret,
    pub user: Option<AuthUser>,
}

/// Session operations exposed to the UI layer.
pub struct AuthService {
    transport: Arc<ApiTransport>,
    store: CredentialStore,
    inspector: TokenInspector,
}

impl AuthService {
    /// Create the service. Refreshes go through the transport's coordinator.
    pub fn new(transport: Arc<ApiTransport>, store: CredentialStore, inspector: TokenInspector) -> Self {
        Self {
            transport,
            store,
            inspector,
        }
    }

    /// Authenticate and persist the issued credential pair.
    ///
    /// Blank fields fail with `VALIDATION_ERROR` before any network call.
    /// A response missing either token is `UNKNOWN` and nothing is stored.
    pub async fn login(&self, email: &str, password: &str) -> ApiResult<LoginResponse> {
        if email.trim().is_empty() || password.trim().is_empty() {
            return Err(ApiError::validation("Email and password are required."));
        }

        let mut payload: LoginPayload = self
            .transport
            .post_json(LOGIN_PATH, &LoginRequest { email, password })
            .await?;

        let tokens = payload
            .access_token
            .take()
            .filter(|token| !token.is_empty())
            .zip(payload.refresh_token.take().filter(|token| !token.is_empty()));
        let Some((access_token, refresh_token)) = tokens else {
            tracing::warn!("Login response is missing a token");
            return Err(ApiError::unknown("Invalid login response."));
        };

        let response = LoginResponse {
            access_token: Secret::new(access_token),
            refresh_token: Secret::new(refresh_token),
            user: payload.profile(),
        };
        self.store
            .store_pair(&response.access_token, &response.refresh_token)
            .await;

        tracing::info!("Logged in as {}", email.trim());
        Ok(response)
    }

    /// Exchange the stored refresh token for a new access token.
    ///
    /// Joins a refresh cycle already in progress instead of starting a
    /// second exchange. A missing refresh token is `UNAUTHORIZED` with no
    /// network call. A failure does not clear the session by itself.
    pub async fn refresh(&self) -> ApiResult<RefreshedTokens> {
        self.transport.coordinator().refresh_now().await
    }

    /// Best-effort server logout followed by an unconditional local clear.
    pub async fn logout(&self) {
        if let Some(refresh_token) = self.store.refresh_token().await {
            let outcome: ApiResult<_> = async {
                let request = RequestDescriptor::post(LOGOUT_PATH).json(&LogoutRequest {
                    refresh_token: refresh_token.expose(),
                })?;
                self.transport.execute(request).await
            }
            .await;
            if let Err(e) = outcome {
                tracing::warn!("Server logout failed, clearing local session anyway: {}", e);
            }
        }

        self.store.clear().await;
        tracing::info!("Logged out");
    }

    /// Re-validate a stored session at start-up.
    ///
    /// With both tokens stored, runs [`refresh`](Self::refresh); a failed
    /// refresh clears the stored pair. Returns whether a session is active.
    pub async fn restore_session(&self) -> bool {
        let has_pair =
            self.store.access_token().await.is_some() && self.store.refresh_token().await.is_some();
        if !has_pair {
            return false;
        }

        match self.refresh().await {
            Ok(_) => {
                tracing::info!("Restored stored session");
                true
            }
            Err(e) => {
                tracing::warn!("Stored session is no longer valid: {}", e);
                self.store.clear().await;
                false
            }
        }
    }

    /// Whether a non-expired access token is stored.
    ///
    /// Advisory only; the server decides authorization.
    pub async fn is_authenticated(&self) -> bool {
        self.store
            .access_token()
            .await
            .is_some_and(|token| !self.inspector.is_expired(token.expose()))
    }

    /// Unverified claims of the stored access token, for display.
    pub async fn current_claims(&self) -> Option<TokenClaims> {
        let token = self.store.access_token().await?;
        self.inspector.decode_claims(token.expose())
    }

    /// Register the forced-logout callback, replacing any previous one.
    pub fn on_unauthorized<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.transport.coordinator().hook().register(callback);
    }

    /// Remove the forced-logout callback.
    pub fn clear_unauthorized_hook(&self) {
        self.transport.coordinator().hook().clear();
    }

    /// The transport, for domain services.
    pub fn transport(&self) -> &Arc<ApiTransport> {
        &self.transport
    }
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("transport", &self.transport)
            .finish_non_exhaustive()
    }
}
