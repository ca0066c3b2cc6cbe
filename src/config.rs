//! Configuration loading and persistence.
//!
//! One JSON file holds the globals, the named proxies, and every
//! account. The daemon writes two things back: a freshly generated
//! device UUID, and the registered flag after a device's first
//! successful registration. UUID and name fields round-trip exactly.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::{fs, time::Duration};

use crate::constants;
use crate::validate;

/// Top-level configuration record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub globals: Globals,
    #[serde(default)]
    pub proxies: Vec<ProxyEntry>,
    #[serde(default)]
    pub accounts: Vec<Account>,
}

/// Settings shared by every account's loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Globals {
    /// Name this machine registers devices under. Empty derives a name
    /// from the hostname.
    #[serde(default)]
    pub device_name: String,
    /// Seconds between polls.
    #[serde(default = "default_check_seconds")]
    pub check_seconds: u64,
    /// Where the asset-caching collaborator keeps sound and icon files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
}

fn default_check_seconds() -> u64 {
    constants::DEFAULT_CHECK_SECONDS
}

/// A named SOCKS5 proxy accounts can route through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyEntry {
    pub name: String,
    /// host:port of the proxy.
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default = "default_proxy_timeout")]
    pub timeout_seconds: u64,
}

fn default_proxy_timeout() -> u64 {
    constants::DEFAULT_PROXY_TIMEOUT_SECONDS
}

impl ProxyEntry {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// One relay account and its device identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Generated once and written back; empty until then.
    #[serde(default)]
    pub device_uuid: String,
    pub username: String,
    pub password: String,
    /// Envelope passphrase for end-to-end encrypted bodies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Push credentials, only needed when this account sends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_key: Option<String>,
    /// Name of a [`ProxyEntry`] to route through.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    /// Set after the first successful registration.
    #[serde(default)]
    pub registered: bool,
}

impl Config {
    /// Platform config file location: `<config dir>/pushling/config.json`.
    pub fn default_path() -> Result<PathBuf> {
        let dir = dirs::config_dir()
            .context("could not determine config directory")?
            .join("pushling");
        Ok(dir.join("config.json"))
    }

    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Persist the current configuration with owner-only permissions.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("failed to write config {}", path.display()))?;

        #[cfg(unix)]
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;

        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.globals.check_seconds < constants::MIN_CHECK_SECONDS {
            bail!(
                "check_seconds must be at least {}",
                constants::MIN_CHECK_SECONDS
            );
        }
        if !self.globals.device_name.is_empty() {
            validate::device_name(&self.globals.device_name)
                .map_err(|e| anyhow::anyhow!("globals.device_name: {e}"))?;
        }
        for account in &self.accounts {
            if account.username.is_empty() || account.password.is_empty() {
                bail!("account is missing username or password");
            }
            if let Some(proxy) = &account.proxy {
                if self.proxy_named(proxy).is_none() {
                    bail!("account {} references unknown proxy {proxy}", account.username);
                }
            }
        }
        Ok(())
    }

    /// Look up a proxy entry by its configured name.
    pub fn proxy_named(&self, name: &str) -> Option<&ProxyEntry> {
        self.proxies.iter().find(|proxy| proxy.name == name)
    }

    /// The device name loops register under: the configured one, or one
    /// derived from the hostname and sanitized to the device-name rule.
    pub fn effective_device_name(&self) -> String {
        if !self.globals.device_name.is_empty() {
            return self.globals.device_name.clone();
        }
        hostname::get()
            .ok()
            .and_then(|host| host.into_string().ok())
            .map(|host| sanitize_device_name(&host))
            .unwrap_or_default()
    }
}

/// Strip a raw hostname down to the relay's device-name charset and
/// length.
fn sanitize_device_name(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .take(validate::DEVICE_NAME_LIMIT)
        .collect()
}

/// Shared handle for config write-back from account loops.
///
/// Each loop only ever mutates its own account entry; the mutex is here
/// to serialize the file write, not to arbitrate ownership.
pub struct ConfigStore {
    path: PathBuf,
    inner: Mutex<Config>,
}

impl ConfigStore {
    pub fn new(path: PathBuf, config: Config) -> Self {
        Self {
            path,
            inner: Mutex::new(config),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Clone of the current config.
    pub fn snapshot(&self) -> Config {
        self.inner.lock().expect("config lock poisoned").clone()
    }

    /// Apply a mutation to one account and flush the file.
    pub fn update_account(&self, index: usize, apply: impl FnOnce(&mut Account)) -> Result<()> {
        let mut config = self.inner.lock().expect("config lock poisoned");
        let account = config
            .accounts
            .get_mut(index)
            .with_context(|| format!("no account at index {index}"))?;
        apply(account);
        config.save(&self.path)
    }
}
