//! Resolver chain assembly
//!
//! The chain is at most two adapters deep: an optional Vault adapter in front
//! of one terminal adapter. Switching sources is purely a matter of changing
//! the [`AppConfig`].

use crate::cli::CliError;
use crate::config::{AppConfig, SourceKind, VaultMode};
use conflux_core::{ConfigResolver, EnvResolver, MapResolver, SettingsResolver, SettingsStore};
use conflux_vault::VaultResolver;
use std::sync::Arc;

/// Build the resolver chain described by `config`.
///
/// # Errors
///
/// Returns a [`CliError`] if the settings file exists but cannot be loaded.
pub fn build_resolver(config: &AppConfig) -> Result<Arc<dyn ConfigResolver>, CliError> {
    let resolver: Arc<dyn ConfigResolver> = match config.vault_mode {
        VaultMode::None => build_terminal(config)?,
        VaultMode::Ambient => Arc::new(VaultResolver::ambient(config.vault.clone())),
        VaultMode::AppRole => {
            let credentials = build_terminal(config)?;
            Arc::new(VaultResolver::app_role(config.vault.clone(), credentials))
        }
    };

    tracing::debug!(chain = %config.chain(), "Resolver chain assembled");
    Ok(resolver)
}

/// Build the adapter that terminates the chain
fn build_terminal(config: &AppConfig) -> Result<Arc<dyn ConfigResolver>, CliError> {
    match config.source {
        SourceKind::Settings => {
            let mut builder = SettingsStore::builder().add_file(&config.settings_file, true);
            if let Some(prefix) = &config.env_prefix {
                builder = builder.add_env(prefix.clone());
            }
            let store = builder.build()?;
            Ok(Arc::new(SettingsResolver::new(Arc::new(store))))
        }
        SourceKind::Env => Ok(Arc::new(EnvResolver::new(config.env_scope))),
        SourceKind::Map => Ok(Arc::new(MapResolver::new(config.map.iter().cloned()))),
    }
}
