// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

//! conflux - source-agnostic configuration for applications
//!
//! This crate is the composition root: it turns an [`AppConfig`] into a
//! resolver chain and hands it to the [`Greeter`], the one consumer of
//! configuration in the binary.
//!
//! # Example
//!
//! ```ignore
//! use conflux::{AppConfig, SourceKind, run};
//!
//! let config = AppConfig {
//!     source: SourceKind::Map,
//!     map: vec![("Name".into(), "Stewie Griffin".into())],
//!     ..AppConfig::default()
//! };
//! assert_eq!(run(&config).await?, "Hello, Stewie Griffin!");
//! ```

// CLI output goes to stdout/stderr by design
#![allow(clippy::print_stdout, clippy::print_stderr)]

/// CLI argument parsing, errors and exit codes.
pub mod cli;
/// Resolver chain assembly.
pub mod compose;
/// Application configuration.
pub mod config;
/// The configuration consumer.
pub mod greeter;
/// Tracing and logging configuration.
pub mod tracing;

pub use cli::{CliError, EXIT_CLI, EXIT_OK, EXIT_SOURCE};
pub use compose::build_resolver;
pub use config::{AppConfig, SourceKind, VaultMode};
pub use greeter::{Greeter, NAME_KEY};

/// Assemble the chain described by `config` and produce the greeting.
///
/// # Errors
///
/// Returns a [`CliError`] if the chain cannot be built or the lookup fails.
pub async fn run(config: &AppConfig) -> Result<String, CliError> {
    let resolver = build_resolver(config)?;
    let greeter = Greeter::new(resolver);
    Ok(greeter.greet().await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_run_with_map() {
        let config = AppConfig {
            source: SourceKind::Map,
            map: vec![("Name".to_string(), "Stewie Griffin".to_string())],
            ..AppConfig::default()
        };
        assert_eq!(run(&config).await.unwrap(), "Hello, Stewie Griffin!");
    }

    #[tokio::test]
    async fn test_same_consumer_different_sources() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("appsettings.toml");
        std::fs::write(&path, "Name = \"Peter Griffin\"\n").unwrap();

        let from_settings = AppConfig {
            settings_file: path,
            ..AppConfig::default()
        };
        let from_map = AppConfig {
            source: SourceKind::Map,
            map: vec![("Name".to_string(), "Lois Griffin".to_string())],
            ..AppConfig::default()
        };

        assert_eq!(run(&from_settings).await.unwrap(), "Hello, Peter Griffin!");
        assert_eq!(run(&from_map).await.unwrap(), "Hello, Lois Griffin!");
    }

    #[tokio::test]
    async fn test_missing_name_exits_with_config_code() {
        let config = AppConfig {
            source: SourceKind::Map,
            ..AppConfig::default()
        };
        let err = run(&config).await.unwrap_err();
        assert_eq!(cli::exit_code_for(&err), EXIT_CLI);
        assert!(err.to_string().contains("Name"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unreachable_vault_exits_with_source_code() {
        let config = AppConfig {
            source: SourceKind::Map,
            vault_mode: VaultMode::AppRole,
            map: vec![
                ("ClientId".to_string(), "abc".to_string()),
                ("ClientSecret".to_string(), "xyz".to_string()),
            ],
            vault: conflux_vault::VaultSettings {
                retries: 0,
                timeout_ms: 2_000,
                ..conflux_vault::VaultSettings::new("http://127.0.0.1:1")
            },
            ..AppConfig::default()
        };
        let err = run(&config).await.unwrap_err();
        assert_eq!(cli::exit_code_for(&err), EXIT_SOURCE);
    }
}
