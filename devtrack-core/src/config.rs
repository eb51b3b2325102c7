//! Client configuration handling.
//!
//! Configuration is read from `client.toml` in the platform config
//! directory (or an explicit path) and then overridden from the
//! environment:
//!
//! | Variable | Field |
//! |---|---|
//! | `DEVTRACK_API_URL` | `api_url` |
//! | `DEVTRACK_TIMEOUT_MS` | `timeout_ms` |
//!
//! The API URL has no built-in default.

use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::transport::BaseUrl;

pub const API_URL_ENV: &str = "DEVTRACK_API_URL";
pub const TIMEOUT_ENV: &str = "DEVTRACK_TIMEOUT_MS";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Root of the API, e.g. `https://tracker.example.com/api`.
    #[serde(default)]
    pub api_url: Option<String>,

    /// Per-request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Keyring service name the credential pair is stored under.
    #[serde(default = "default_keyring_service")]
    pub keyring_service: String,

    /// Use the OS keyring when available.
    #[serde(default = "default_prefer_keyring")]
    pub prefer_keyring: bool,

    /// Logging level.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Path of the file that was loaded, if any.
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

fn default_timeout_ms() -> u64 {
    15_000
}

fn default_keyring_service() -> String {
    "devtrack".to_string()
}

fn default_prefer_keyring() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            timeout_ms: default_timeout_ms(),
            keyring_service: default_keyring_service(),
            prefer_keyring: default_prefer_keyring(),
            log_level: default_log_level(),
            config_path: None,
        }
    }
}

impl ClientConfig {
    /// The parsed API root.
    pub fn base_url(&self) -> Result<BaseUrl> {
        let raw = self
            .api_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                anyhow!(
                    "API URL is not configured; set {} or api_url in client.toml",
                    API_URL_ENV
                )
            })?;
        BaseUrl::parse(raw).with_context(|| format!("Invalid API URL {:?}", raw))
    }

    /// Per-request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Apply overrides from a variable lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(API_URL_ENV) {
            self.api_url = Some(url);
        }
        if let Some(timeout) = lookup(TIMEOUT_ENV) {
            self.timeout_ms = timeout
                .trim()
                .parse()
                .with_context(|| format!("Invalid {} value {:?}", TIMEOUT_ENV, timeout))?;
        }
        Ok(())
    }
}

/// Load configuration from `path`, or the default location when `None`.
///
/// An explicit path must exist; a missing default file yields defaults.
/// Environment overrides are applied last.
pub fn load_config(path: Option<&Path>) -> Result<ClientConfig> {
    let mut config = match path {
        Some(path) => load_from_path(path)?,
        None => match default_config_path() {
            Some(path) if path.exists() => load_from_path(&path)?,
            _ => ClientConfig::default(),
        },
    };

    config.apply_overrides(|name| std::env::var(name).ok())?;
    Ok(config)
}

/// Parse a configuration file.
pub fn load_from_path(path: &Path) -> Result<ClientConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {:?}", path))?;
    let mut config: ClientConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config from {:?}", path))?;
    config.config_path = Some(path.to_path_buf());
    Ok(config)
}

/// `client.toml` in the platform config directory.
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("com", "devtrack", "devtrack").map(|dirs| dirs.config_dir().join("client.toml"))
}
