//! Application configuration for the composition root

use conflux_core::EnvScope;
use conflux_vault::VaultSettings;
use std::fmt;
use std::path::PathBuf;

/// Default settings file, relative to the working directory
pub const DEFAULT_SETTINGS_FILE: &str = "appsettings.json";

/// Which adapter terminates the resolver chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, clap::ValueEnum)]
pub enum SourceKind {
    /// Layered settings file (plus optional environment overlay)
    #[default]
    Settings,
    /// Environment variables at a chosen scope
    Env,
    /// Values given on the command line
    Map,
}

/// Whether and how Vault sits in front of the terminal source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, clap::ValueEnum)]
pub enum VaultMode {
    /// No Vault, the terminal source answers directly
    #[default]
    None,
    /// Vault authenticated with the ambient token; the terminal source is not consulted
    Ambient,
    /// Vault authenticated with an AppRole read from the terminal source
    #[value(name = "approle")]
    AppRole,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Settings => "settings",
            Self::Env => "env",
            Self::Map => "map",
        };
        write!(f, "{s}")
    }
}

impl fmt::Display for VaultMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::Ambient => "ambient",
            Self::AppRole => "approle",
        };
        write!(f, "{s}")
    }
}

/// Everything needed to assemble the resolver chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Terminal source
    pub source: SourceKind,
    /// Vault placement
    pub vault_mode: VaultMode,
    /// Settings file for [`SourceKind::Settings`], optional on disk
    pub settings_file: PathBuf,
    /// Scope for [`SourceKind::Env`]
    pub env_scope: EnvScope,
    /// Environment overlay prefix for [`SourceKind::Settings`]
    pub env_prefix: Option<String>,
    /// Values for [`SourceKind::Map`]
    pub map: Vec<(String, String)>,
    /// Vault connection settings
    pub vault: VaultSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::default(),
            vault_mode: VaultMode::default(),
            settings_file: PathBuf::from(DEFAULT_SETTINGS_FILE),
            env_scope: EnvScope::default(),
            env_prefix: None,
            map: Vec::new(),
            vault: VaultSettings::default(),
        }
    }
}

impl AppConfig {
    /// Human-readable description of the chain, outermost adapter first
    #[must_use]
    pub fn chain(&self) -> String {
        match self.vault_mode {
            VaultMode::None => self.source.to_string(),
            VaultMode::Ambient => "vault(ambient)".to_string(),
            VaultMode::AppRole => format!("vault(approle) -> {}", self.source),
        }
    }
}
