//! `HashiCorp` Vault configuration resolver for conflux
//!
//! [`VaultResolver`] reads configuration values from Vault KV v2 secrets.
//! It authenticates either with ambient credentials (the token the `vault`
//! CLI would use) or with an AppRole whose role id and secret id come from
//! another [`ConfigResolver`](conflux_core::ConfigResolver), so one resolver
//! bootstraps the next:
//!
//! ```ignore
//! use conflux_core::{EnvResolver, EnvScope};
//! use conflux_vault::{VaultResolver, VaultSettings};
//!
//! let credentials = Arc::new(EnvResolver::new(EnvScope::Process));
//! let vault = VaultResolver::app_role(VaultSettings::from_env(), credentials);
//! let name = vault.get_async("Name").await?;
//! ```

mod backend;
mod credentials;
mod resolver;
mod settings;

pub use backend::{HttpVaultBackend, SecretClient, VaultBackend};
pub use credentials::{CredentialKeys, Credentials, Login, VaultAuth, discover_token};
pub use resolver::VaultResolver;
pub use settings::VaultSettings;
