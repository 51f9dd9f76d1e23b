use crate::config::{AppConfig, SourceKind, VaultMode};
use crate::tracing::{LogLevel, TracingFormat};
use clap::Parser;
use conflux_core::{EnvScope, ResolveError, SettingsError, bridge};
use conflux_vault::VaultSettings;
use miette::{Diagnostic, Report};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the CLI application
pub const EXIT_OK: i32 = 0;
/// Configuration error or missing key exit code
pub const EXIT_CLI: i32 = 2;
/// Configuration source unavailable exit code
pub const EXIT_SOURCE: i32 = 3;

/// CLI-specific error types with proper exit code mapping
#[derive(Error, Debug, Clone, Diagnostic)]
pub enum CliError {
    /// Configuration error or missing key (exit code 2)
    #[error("Configuration error: {message}")]
    #[diagnostic(code(conflux::cli::config))]
    Config {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// A configuration source could not be consulted (exit code 3)
    #[error("Source unavailable: {message}")]
    #[diagnostic(code(conflux::cli::source))]
    Source {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// Other unexpected error (exit code 3)
    #[error("Unexpected error: {message}")]
    #[diagnostic(code(conflux::cli::other))]
    Other {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
}

impl CliError {
    /// Create a new configuration error with help text
    #[must_use]
    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create a new source-unavailable error
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Source {
            message: message.into(),
            help: None,
        }
    }

    /// Create a new source-unavailable error with help text
    #[must_use]
    pub fn unavailable_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Source {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create a new other error
    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
            help: None,
        }
    }

    /// Short machine-readable code used in JSON error envelopes
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Source { .. } => "source",
            Self::Other { .. } => "other",
        }
    }
}

/// Convert a lookup failure into the matching `CliError` category.
///
/// - A missing key is a configuration problem (exit code 2)
/// - An unreachable source is a source error (exit code 3)
impl From<ResolveError> for CliError {
    fn from(err: ResolveError) -> Self {
        match &err {
            ResolveError::NotFound { key, provider } => Self::config_with_help(
                err.to_string(),
                format!(
                    "Define '{key}' in the {provider} source, or pick another source with --source"
                ),
            ),
            ResolveError::SourceUnavailable { message, .. }
                if message.starts_with(bridge::CALLER_CONTEXT) =>
            {
                Self::unavailable_with_help(
                    err.to_string(),
                    "Use the async lookup, or call from a multi-thread runtime",
                )
            }
            ResolveError::SourceUnavailable { provider, .. } => Self::unavailable_with_help(
                err.to_string(),
                format!(
                    "Check that the {provider} source is reachable and its credentials are valid"
                ),
            ),
        }
    }
}

/// Convert a settings construction failure into a `CliError`.
///
/// Problems with the settings documents themselves are configuration errors;
/// failing to read or watch them is a source error.
impl From<SettingsError> for CliError {
    fn from(err: SettingsError) -> Self {
        match &err {
            SettingsError::Missing { .. }
            | SettingsError::Parse { .. }
            | SettingsError::UnsupportedFormat { .. } => {
                Self::config_with_help(err.to_string(), "Fix the settings file or pass --settings")
            }
            SettingsError::Io { .. } | SettingsError::Watch { .. } => {
                Self::unavailable(err.to_string())
            }
            SettingsError::Poisoned => Self::other(err.to_string()),
        }
    }
}

/// Map CLI error to appropriate exit code
#[must_use]
pub const fn exit_code_for(err: &CliError) -> i32 {
    match err {
        CliError::Config { .. } => EXIT_CLI,
        CliError::Source { .. } | CliError::Other { .. } => EXIT_SOURCE,
    }
}

/// Render error appropriately based on JSON flag
pub fn render_error(err: &CliError, json_mode: bool) {
    if json_mode {
        let error_envelope = ErrorEnvelope::new(serde_json::json!({
            "code": err.code(),
            "message": err.to_string()
        }));

        match serde_json::to_string(&error_envelope) {
            Ok(json) => println!("{json}"),
            Err(_) => eprintln!("Error serializing error response"),
        }
    } else {
        let report = Report::new(err.clone());
        eprintln!("{report:?}");
        let _ = io::stderr().flush();
    }
}

/// Success response envelope for JSON output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkEnvelope<T> {
    /// Status indicator - always "ok" for success
    pub status: &'static str,
    /// The actual data payload
    pub data: T,
}

impl<T> OkEnvelope<T> {
    /// Create a new success envelope
    #[must_use]
    pub const fn new(data: T) -> Self {
        Self { status: "ok", data }
    }
}

/// Error response envelope for JSON output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope<E> {
    /// Status indicator - always "error" for failures
    pub status: &'static str,
    /// The error details
    pub error: E,
}

impl<E> ErrorEnvelope<E> {
    /// Create a new error envelope
    #[must_use]
    pub const fn new(error: E) -> Self {
        Self {
            status: "error",
            error,
        }
    }
}

/// Greet the configured user, reading `Name` from the chosen configuration source.
///
/// Every option can also be set through its `CONFLUX_*` environment variable.
#[derive(Parser, Debug)]
#[command(name = "conflux")]
#[command(about = "Resolve configuration from settings files, the environment or Vault")]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    /// Terminal configuration source.
    #[arg(long, env = "CONFLUX_SOURCE", default_value = "settings", value_enum)]
    pub source: SourceKind,

    /// Put Vault in front of the source.
    #[arg(long, env = "CONFLUX_VAULT", default_value = "none", value_enum)]
    pub vault: VaultMode,

    /// Settings file read by the settings source.
    #[arg(long, env = "CONFLUX_SETTINGS", default_value = "appsettings.json")]
    pub settings: PathBuf,

    /// Environment scope read by the env source (process, user, machine).
    #[arg(long, env = "CONFLUX_ENV_SCOPE", default_value = "process")]
    pub env_scope: EnvScope,

    /// Overlay environment variables with this prefix on top of the settings file.
    #[arg(long, env = "CONFLUX_ENV_PREFIX")]
    pub env_prefix: Option<String>,

    /// Value for the map source, repeatable.
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub set: Vec<(String, String)>,

    /// Vault server address, defaults to `VAULT_ADDR`.
    #[arg(long, env = "CONFLUX_VAULT_ADDR")]
    pub vault_addr: Option<String>,

    /// Vault KV v2 mount.
    #[arg(long, env = "CONFLUX_VAULT_MOUNT", default_value = "secret")]
    pub vault_mount: String,

    /// Path under the mount that keys are read below.
    #[arg(long, env = "CONFLUX_VAULT_PATH", default_value = "")]
    pub vault_path: String,

    /// Logging verbosity level.
    #[arg(
        short = 'L',
        long,
        env = "CONFLUX_LOG_LEVEL",
        help = "Set logging level",
        default_value = "warn",
        value_enum
    )]
    pub level: LogLevel,

    /// Log output format, JSON whenever `--json` is given.
    #[arg(long, env = "CONFLUX_LOG_FORMAT", default_value = "pretty", value_enum)]
    pub log_format: TracingFormat,

    /// Emit JSON envelope instead of plain text.
    #[arg(long, env = "CONFLUX_JSON", help = "Emit JSON envelope instead of plain text")]
    pub json: bool,
}

impl Cli {
    /// Format for log output
    #[must_use]
    pub const fn tracing_format(&self) -> TracingFormat {
        if self.json {
            TracingFormat::Json
        } else {
            self.log_format
        }
    }

    /// Resolved application configuration
    #[must_use]
    pub fn config(&self) -> AppConfig {
        let vault = self
            .vault_addr
            .as_ref()
            .map_or_else(VaultSettings::from_env, |addr| VaultSettings::new(addr.clone()))
            .with_mount(self.vault_mount.clone())
            .with_path_prefix(self.vault_path.clone());

        AppConfig {
            source: self.source,
            vault_mode: self.vault,
            settings_file: self.settings.clone(),
            env_scope: self.env_scope,
            env_prefix: self.env_prefix.clone(),
            map: self.set.clone(),
            vault,
        }
    }
}

/// Parse a `KEY=VALUE` pair
fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Parse command line arguments
#[must_use]
pub fn parse() -> Cli {
    Cli::parse()
}
