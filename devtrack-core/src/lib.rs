//! # Devtrack Core
//!
//! Authenticated HTTP client for the device tracking API.
//!
//! This crate provides:
//! - Durable storage of the access/refresh credential pair
//! - An HTTP transport that attaches credentials and transparently renews
//!   them on 401 with single-flight refresh
//! - Login, logout and session restore
//! - Contractor device endpoints
//! - A normalized error taxonomy for every failure
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use devtrack_core::{DevtrackClient, DeviceQuery};
//!
//! async fn list_devices() -> anyhow::Result<()> {
//!     let client = DevtrackClient::builder("https://tracker.example.com/api").build()?;
//!     client.auth().login("crew@example.com", "hunter2").await?;
//!
//!     let page = client.contractors().devices(&DeviceQuery::page_size(20)).await?;
//!     for device in page.items {
//!         println!("{} {}", device.serial_number, device.status);
//!     }
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod contractor;
pub mod error;
pub mod refresh;
pub mod store;
pub mod token;
pub mod transport;

// Re-export commonly used types at crate root
pub use auth::{AuthService, AuthUser, LoginResponse};

pub use client::{DevtrackClient, DevtrackClientBuilder};

pub use config::{ClientConfig, load_config};

pub use contractor::{
    Contractor,
    ContractorDashboard,
    ContractorService,
    ContractorTrend,
    Device,
    DeviceQuery,
    DeviceStatus,
    PagedResult,
    UpdateDeviceStatusRequest,
    UpdateDeviceStatusResponse,
};

pub use error::{ApiError, ApiResult, ErrorKind};

pub use refresh::{
    HttpTokenRefresher,
    RefreshCoordinator,
    RefreshedTokens,
    TokenRefresher,
    UnauthorizedHook,
};

pub use store::{
    CredentialSlot,
    CredentialStore,
    MemoryStore,
    Secret,
    SecretStore,
    StoreError,
    create_store,
};

#[cfg(feature = "keyring-store")]
pub use store::KeyringStore;

pub use token::{Clock, FixedClock, SystemClock, TokenClaims, TokenInspector};

pub use transport::{ApiResponse, ApiTransport, BaseUrl, ExemptPaths, RequestDescriptor};
