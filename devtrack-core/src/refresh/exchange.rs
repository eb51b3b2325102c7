//! The refresh-token exchange.
//!
//! [`HttpTokenRefresher`] talks to `/auth/refresh` on its own `reqwest`
//! client, outside the interception pipeline of
//! [`ApiTransport`](crate::transport::ApiTransport), so a failing refresh
//! can never trigger another refresh.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::error::{ApiError, ApiResult};
use crate::store::{CredentialSlot, CredentialStore, Secret};
use crate::transport::BaseUrl;

/// Path of the refresh endpoint, relative to the base URL.
pub const REFRESH_PATH: &str = "/auth/refresh";

/// Body sent to the refresh endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Body returned by the refresh endpoint.
///
/// `refreshToken` is only present when the backend rotates refresh tokens.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    #[serde(default, alias = "access_token")]
    pub access_token: Option<String>,

    #[serde(default, alias = "refresh_token")]
    pub refresh_token: Option<String>,
}

/// Tokens issued by a successful exchange, already persisted.
#[derive(Debug, Clone)]
pub struct RefreshedTokens {
    /// The new access token.
    pub access_token: Secret,

    /// The rotated refresh token, when the backend issued one.
    pub refresh_token: Option<Secret>,
}

/// Exchanges the stored refresh token for a new access token.
///
/// Implementations persist what they receive before returning.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Perform one exchange.
    async fn refresh(&self) -> ApiResult<RefreshedTokens>;
}

/// [`TokenRefresher`] over HTTP with a dedicated client.
pub struct HttpTokenRefresher {
    http: reqwest::Client,
    endpoint: Url,
    store: CredentialStore,
}

impl HttpTokenRefresher {
    /// Create a refresher posting to `{base_url}/auth/refresh`.
    pub fn new(base_url: &BaseUrl, timeout: Duration, store: CredentialStore) -> ApiResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::unknown(format!("failed to build refresh client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: base_url.join(REFRESH_PATH)?,
            store,
        })
    }
}

impl std::fmt::Debug for HttpTokenRefresher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTokenRefresher")
            .field("endpoint", &self.endpoint.as_str())
            .finish()
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self) -> ApiResult<RefreshedTokens> {
        let refresh_token = self
            .store
            .refresh_token()
            .await
            .ok_or_else(|| ApiError::unauthorized("Missing refresh token."))?;

        tracing::debug!("Exchanging refresh token at {}", self.endpoint);

        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&RefreshRequest {
                refresh_token: refresh_token.expose().to_string(),
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            return Err(ApiError::from_status(status, &body));
        }

        let data: RefreshResponse = serde_json::from_slice(&body)
            .map_err(|e| ApiError::unknown(format!("Invalid refresh response: {}", e)))?;

        let access_token = data
            .access_token
            .filter(|token| !token.is_empty())
            .map(Secret::new)
            .ok_or_else(|| ApiError::unknown("Invalid refresh response."))?;
        let rotated = data
            .refresh_token
            .filter(|token| !token.is_empty())
            .map(Secret::new);

        self.store
            .set(CredentialSlot::AccessToken, Some(&access_token))
            .await;
        if let Some(rotated) = &rotated {
            self.store
                .set(CredentialSlot::RefreshToken, Some(rotated))
                .await;
        }

        tracing::info!(
            "Access token refreshed (refresh token {})",
            if rotated.is_some() { "rotated" } else { "kept" }
        );

        Ok(RefreshedTokens {
            access_token,
            refresh_token: rotated,
        })
    }
}
