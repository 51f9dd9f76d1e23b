//! Vault connection settings

use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_ADDRESS: &str = "http://127.0.0.1:8200";

/// Where and how to read configuration secrets from Vault
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct VaultSettings {
    /// Vault server address (e.g. `https://vault.example.com:8200`)
    pub address: String,

    /// KV v2 secret engine mount point (defaults to "secret")
    pub mount: String,

    /// Path under the mount that configuration keys live below
    pub path_prefix: String,

    /// Field within each secret holding the value (defaults to "value")
    pub field: String,

    /// AppRole auth method mount point (defaults to "approle")
    pub approle_mount: String,

    /// Per-call timeout in milliseconds
    pub timeout_ms: u64,

    /// Extra attempts after a failed remote call
    pub retries: u32,

    /// Delay before the first retry, doubled for each further one
    pub retry_backoff_ms: u64,
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            mount: "secret".to_string(),
            path_prefix: String::new(),
            field: "value".to_string(),
            approle_mount: "approle".to_string(),
            timeout_ms: 10_000,
            retries: 2,
            retry_backoff_ms: 200,
        }
    }
}

impl VaultSettings {
    /// Create settings for a Vault server address
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    /// Default settings with the address taken from `VAULT_ADDR`
    #[must_use]
    pub fn from_env() -> Self {
        std::env::var("VAULT_ADDR").map_or_else(|_| Self::default(), Self::new)
    }

    /// Set the path prefix keys are read below
    #[must_use]
    pub fn with_path_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.path_prefix = prefix.into();
        self
    }

    /// Set the KV v2 mount
    #[must_use]
    pub fn with_mount(mut self, mount: impl Into<String>) -> Self {
        self.mount = mount.into();
        self
    }

    /// Per-call timeout
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Delay before retry number `attempt` (zero-based)
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
            .saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Secret path (relative to the mount) holding `key`.
    ///
    /// `:` section separators in the key become path segments, so
    /// `Db:Password` under prefix `myapp` reads `myapp/Db/Password`.
    #[must_use]
    pub fn secret_path(&self, key: &str) -> String {
        let key = key.replace(':', "/");
        let prefix = self.path_prefix.trim_matches('/');
        if prefix.is_empty() {
            key
        } else {
            format!("{prefix}/{key}")
        }
    }

    /// Full KV v2 API path including mount, for diagnostics
    #[must_use]
    pub fn full_path(&self, key: &str) -> String {
        format!("{}/data/{}", self.mount, self.secret_path(key))
    }
}
