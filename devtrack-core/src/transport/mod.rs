//! The shared HTTP client and its interception pipeline.
//!
//! Every call goes through two stages:
//!
//! 1. **Request stage** - unless the target is an exempt path, the stored
//!    access token is attached as `Authorization: Bearer ...` when present
//!    and not expired.
//! 2. **Response-error stage** - a 401 on a non-exempt call that has not
//!    been retried marks the call retried, obtains a renewed token from the
//!    [`RefreshCoordinator`] (leading or joining the cycle), and replays the
//!    original call once with the new credential. Every other failure is
//!    normalized into an [`ApiError`] and returned.
//!
//! Callers never observe the intermediate 401.

use reqwest::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;
use url::Url;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::refresh::RefreshCoordinator;
use crate::store::CredentialStore;
use crate::token::TokenInspector;

mod endpoint;
mod request;

pub use endpoint::{BaseUrl, ExemptPaths};
pub use request::{ApiResponse, RequestDescriptor};

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(15_000);

/// The authenticated HTTP transport.
pub struct ApiTransport {
    http: reqwest::Client,
    base_url: BaseUrl,
    exempt: ExemptPaths,
    store: CredentialStore,
    inspector: TokenInspector,
    coordinator: Arc<RefreshCoordinator>,
}

impl ApiTransport {
    /// Create a transport rooted at `base_url`.
    pub fn new(
        base_url: BaseUrl,
        timeout: Duration,
        store: CredentialStore,
        inspector: TokenInspector,
        coordinator: Arc<RefreshCoordinator>,
    ) -> ApiResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::unknown(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            exempt: ExemptPaths::default(),
            store,
            inspector,
            coordinator,
        })
    }

    /// Replace the exempt path list.
    pub fn with_exempt_paths(mut self, exempt: ExemptPaths) -> Self {
        self.exempt = exempt;
        self
    }

    pub fn base_url(&self) -> &BaseUrl {
        &self.base_url
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    /// Run a call through the pipeline.
    pub async fn execute(&self, request: RequestDescriptor) -> ApiResult<ApiResponse> {
        let span = tracing::debug_span!(
            "api_request",
            request_id = %Uuid::new_v4(),
            method = %request.method(),
            path = %request.path(),
        );
        self.run(request).instrument(span).await
    }

    async fn run(&self, mut request: RequestDescriptor) -> ApiResult<ApiResponse> {
        let url = self.base_url.join(request.path())?;
        let exempt = self.exempt.is_exempt(&self.base_url, &url);

        loop {
            let response = self.dispatch(&request, &url, exempt).await?;
            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }

            if exempt || status != StatusCode::UNAUTHORIZED || request.is_retried() {
                tracing::debug!("Request failed with {}", status);
                return Err(response.into_error());
            }

            request.mark_retried();
            let token = self.coordinator.renew().await?;
            request.set_bearer(&token)?;
            tracing::debug!("Replaying request with renewed credentials");
        }
    }

    /// Request stage plus the network round trip.
    async fn dispatch(
        &self,
        request: &RequestDescriptor,
        url: &Url,
        exempt: bool,
    ) -> ApiResult<ApiResponse> {
        let mut builder = self
            .http
            .request(request.method().clone(), url.clone())
            .headers(request.headers().clone());

        if !request.query_pairs().is_empty() {
            builder = builder.query(request.query_pairs());
        }
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        if !exempt && !request.has_authorization() {
            match self.store.access_token().await {
                Some(token) if !self.inspector.is_expired(token.expose()) => {
                    builder = builder.bearer_auth(token.expose());
                }
                Some(_) => tracing::debug!("Stored access token expired, sending without credential"),
                None => tracing::debug!("No access token stored, sending without credential"),
            }
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        Ok(ApiResponse::new(status, body.to_vec()))
    }

    /// Execute `request` and decode the JSON body.
    pub async fn send_json<T: DeserializeOwned>(&self, request: RequestDescriptor) -> ApiResult<T> {
        self.execute(request).await?.json()
    }

    /// POST `body` to `path` and decode the JSON response.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = RequestDescriptor::post(path).json(body)?;
        self.execute(request).await?.json()
    }

    /// PUT `body` to `path` and decode the JSON response.
    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = RequestDescriptor::put(path).json(body)?;
        self.execute(request).await?.json()
    }
}

impl std::fmt::Debug for ApiTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiTransport")
            .field("base_url", &self.base_url.to_string())
            .field("exempt", &self.exempt)
            .field("coordinator", &self.coordinator)
            .finish()
    }
}
