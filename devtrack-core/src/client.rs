//! Wiring of the credential store, inspector, coordinator, transport and
//! services into one client.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use crate::auth::AuthService;
use crate::config::ClientConfig;
use crate::contractor::ContractorService;
use crate::refresh::{HttpTokenRefresher, RefreshCoordinator, TokenRefresher, UnauthorizedHook};
use crate::store::{CredentialStore, MemoryStore, SecretStore, create_store};
use crate::token::{Clock, SystemClock, TokenInspector};
use crate::transport::{ApiTransport, BaseUrl, DEFAULT_TIMEOUT};

/// A fully wired client.
///
/// # Example
///
/// ```no_run
/// use devtrack_core::DevtrackClient;
///
/// # async fn example() -> anyhow::Result<()> {
/// let client = DevtrackClient::builder("https://tracker.example.com/api").build()?;
/// client.auth().on_unauthorized(|| eprintln!("Session expired, please log in again"));
///
/// client.auth().login("crew@example.com", "hunter2").await?;
/// let me = client.contractors().current_contractor().await?;
/// println!("Signed in as {}", me.contractor_name);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct DevtrackClient {
    auth: AuthService,
    contractors: ContractorService,
    store: CredentialStore,
}

impl DevtrackClient {
    /// Start building a client for the API rooted at `api_url`.
    pub fn builder(api_url: impl Into<String>) -> DevtrackClientBuilder {
        DevtrackClientBuilder::new(api_url)
    }

    /// Build a client from loaded configuration.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let base_url = config.base_url()?;
        DevtrackClient::builder(base_url.to_string())
            .timeout(config.timeout())
            .secret_store(create_store(config.prefer_keyring, &config.keyring_service))
            .build()
    }

    /// Session operations.
    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    /// Contractor device operations.
    pub fn contractors(&self) -> &ContractorService {
        &self.contractors
    }

    /// The credential store.
    pub fn store(&self) -> &CredentialStore {
        &self.store
    }
}

/// Builder for [`DevtrackClient`].
pub struct DevtrackClientBuilder {
    api_url: String,
    timeout: Duration,
    secret_store: Option<Arc<dyn SecretStore>>,
    clock: Arc<dyn Clock>,
    refresher: Option<Arc<dyn TokenRefresher>>,
}

impl DevtrackClientBuilder {
    fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            timeout: DEFAULT_TIMEOUT,
            secret_store: None,
            clock: Arc::new(SystemClock),
            refresher: None,
        }
    }

    /// Per-request timeout (default 15 s).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Storage backend (default: in-memory).
    pub fn secret_store(mut self, store: Arc<dyn SecretStore>) -> Self {
        self.secret_store = Some(store);
        self
    }

    /// Clock used for expiry checks.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the HTTP refresh exchange.
    pub fn refresher(mut self, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    /// Wire everything together.
    pub fn build(self) -> Result<DevtrackClient> {
        let base_url = BaseUrl::parse(&self.api_url)
            .with_context(|| format!("Invalid API URL {:?}", self.api_url))?;
        let store = CredentialStore::from_shared(
            self.secret_store
                .unwrap_or_else(|| Arc::new(MemoryStore::new())),
        );
        let inspector = TokenInspector::new(self.clock);

        let refresher: Arc<dyn TokenRefresher> = match self.refresher {
            Some(refresher) => refresher,
            None => Arc::new(HttpTokenRefresher::new(&base_url, self.timeout, store.clone())?),
        };
        let hook = UnauthorizedHook::new();
        let coordinator = Arc::new(RefreshCoordinator::new(refresher, store.clone(), hook));
        let transport = Arc::new(ApiTransport::new(
            base_url.clone(),
            self.timeout,
            store.clone(),
            inspector.clone(),
            coordinator,
        )?);

        tracing::debug!("Client ready for {}", base_url);

        Ok(DevtrackClient {
            auth: AuthService::new(transport.clone(), store.clone(), inspector),
            contractors: ContractorService::new(transport),
            store,
        })
    }
}
