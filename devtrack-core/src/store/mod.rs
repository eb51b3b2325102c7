//! Durable credential storage.
//!
//! This module provides:
//! - [`Secret`] - A wrapper for token values that prevents accidental logging
//! - [`SecretStore`] - Trait for platform storage backends
//! - [`MemoryStore`] - In-memory implementation for testing
//! - [`KeyringStore`] - OS keyring implementation (with `keyring-store` feature)
//! - [`CredentialStore`] - The credential pair contract used by the client
//! - [`create_store`] - Helper to select backend based on availability
//!
//! # Storage Layout
//!
//! The credential pair is persisted as two independent entries keyed
//! `"accessToken"` and `"refreshToken"`. Absence of both is the logged out
//! state.
//!
//! # Example
//!
//! ```rust,ignore
//! use devtrack_core::store::{CredentialSlot, CredentialStore, MemoryStore, Secret};
//!
//! let store = CredentialStore::new(MemoryStore::new());
//! store.set(CredentialSlot::AccessToken, Some(&Secret::new("eyJ..."))).await;
//!
//! let token = store.get(CredentialSlot::AccessToken).await;
//! assert_eq!(token.unwrap().expose(), "eyJ...");
//! ```

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

mod memory;
#[cfg(feature = "keyring-store")]
mod keyring;

pub use memory::MemoryStore;
#[cfg(feature = "keyring-store")]
pub use keyring::KeyringStore;

/// A secret value that prevents accidental exposure in logs.
///
/// The inner value is only accessible via [`expose()`](Secret::expose) and
/// is zeroed when dropped. Debug and Display print `[REDACTED]`.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Secret(String);

impl Secret {
    /// Create a new secret from a string value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the secret value.
    ///
    /// Use sparingly and never log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the secret holds an empty string.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret([REDACTED])")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Secret {}

/// Error type for storage backend operations.
///
/// These never leave the store layer: [`CredentialStore`] logs and
/// swallows them.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The storage backend encountered an error.
    #[error("backend error: {message}")]
    BackendError { message: String },

    /// The keyring backend is not available.
    #[error("keyring not available: {message}")]
    KeyringUnavailable { message: String },
}

/// Abstraction over platform storage backends.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Retrieve a secret by key.
    ///
    /// Returns `Ok(None)` if the key doesn't exist.
    async fn get(&self, key: &str) -> Result<Option<Secret>, StoreError>;

    /// Store a secret at the given key, overwriting any existing value.
    async fn set(&self, key: &str, secret: &Secret) -> Result<(), StoreError>;

    /// Delete a secret by key.
    ///
    /// Returns `Ok(())` even if the key didn't exist.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// The two persisted entries of a credential pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialSlot {
    /// The short-lived bearer token.
    AccessToken,
    /// The longer-lived token exchanged for new access tokens.
    RefreshToken,
}

impl CredentialSlot {
    /// Both slots, in the order they are written.
    pub const ALL: [CredentialSlot; 2] = [CredentialSlot::AccessToken, CredentialSlot::RefreshToken];

    /// Storage key of the slot.
    pub fn key(&self) -> &'static str {
        match self {
            CredentialSlot::AccessToken => "accessToken",
            CredentialSlot::RefreshToken => "refreshToken",
        }
    }
}

impl fmt::Display for CredentialSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Credential pair storage on top of a [`SecretStore`].
///
/// Backend failures are logged and degrade to "credential absent"; no
/// operation here ever returns an error.
#[derive(Clone)]
pub struct CredentialStore {
    backend: Arc<dyn SecretStore>,
}

impl CredentialStore {
    /// Wrap a storage backend.
    pub fn new(backend: impl SecretStore + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    /// Wrap an already shared storage backend.
    pub fn from_shared(backend: Arc<dyn SecretStore>) -> Self {
        Self { backend }
    }

    /// Write a slot. `None` (or an empty value) deletes it.
    pub async fn set(&self, slot: CredentialSlot, value: Option<&Secret>) {
        let result = match value {
            Some(secret) if !secret.is_empty() => self.backend.set(slot.key(), secret).await,
            _ => self.backend.delete(slot.key()).await,
        };

        if let Err(e) = result {
            tracing::error!("credential store set({}) failed: {}", slot, e);
        }
    }

    /// Read a slot.
    pub async fn get(&self, slot: CredentialSlot) -> Option<Secret> {
        match self.backend.get(slot.key()).await {
            Ok(value) => value.filter(|secret| !secret.is_empty()),
            Err(e) => {
                tracing::error!("credential store get({}) failed: {}", slot, e);
                None
            }
        }
    }

    /// Delete every listed slot; a failure on one does not stop the others.
    pub async fn remove_all(&self, slots: &[CredentialSlot]) {
        for slot in slots {
            if let Err(e) = self.backend.delete(slot.key()).await {
                tracing::error!("credential store remove({}) failed: {}", slot, e);
            }
        }
    }

    /// Current access token, if any.
    pub async fn access_token(&self) -> Option<Secret> {
        self.get(CredentialSlot::AccessToken).await
    }

    /// Current refresh token, if any.
    pub async fn refresh_token(&self) -> Option<Secret> {
        self.get(CredentialSlot::RefreshToken).await
    }

    /// Persist a freshly issued pair.
    pub async fn store_pair(&self, access_token: &Secret, refresh_token: &Secret) {
        self.set(CredentialSlot::AccessToken, Some(access_token)).await;
        self.set(CredentialSlot::RefreshToken, Some(refresh_token)).await;
    }

    /// Remove both tokens.
    pub async fn clear(&self) {
        self.remove_all(&CredentialSlot::ALL).await;
    }
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore").finish_non_exhaustive()
    }
}

/// Create a storage backend with automatic selection.
///
/// - If `prefer_keyring` is `true` and the `keyring-store` feature is enabled,
///   attempts a [`KeyringStore`] under `service_name` and falls back to
///   [`MemoryStore`] with a warning if the keyring is unavailable.
/// - Otherwise returns a [`MemoryStore`].
pub fn create_store(prefer_keyring: bool, service_name: &str) -> Arc<dyn SecretStore> {
    #[cfg(feature = "keyring-store")]
    if prefer_keyring {
        match KeyringStore::try_new(service_name) {
            Ok(store) => {
                tracing::info!("Using OS keyring for credential storage");
                return Arc::new(store);
            }
            Err(e) => {
                tracing::warn!(
                    "Keyring unavailable ({}), falling back to memory store. \
                     Credentials will not persist across restarts.",
                    e
                );
            }
        }
    }

    #[cfg(not(feature = "keyring-store"))]
    if prefer_keyring {
        tracing::warn!(
            "Keyring storage requested for {} but keyring-store feature not enabled. \
             Using memory store.",
            service_name
        );
    }

    tracing::debug!("Using in-memory credential storage");
    Arc::new(MemoryStore::new())
}
