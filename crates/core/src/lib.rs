//! Configuration resolution for conflux
//!
//! Provides a uniform read interface, [`ConfigResolver`], that decouples
//! application code from the concrete source of configuration values.
//! Built-in adapters cover layered settings files, environment variables at a
//! given scope, and in-memory mappings. The vault adapter lives in the
//! `conflux-vault` crate and chains onto any resolver here for its credentials.
//!
//! # Example
//!
//! ```ignore
//! use conflux_core::{ConfigResolver, MapResolver};
//!
//! let resolver = MapResolver::new([("Name", "Stewie Griffin")]);
//! assert_eq!(resolver.get("Name")?, "Stewie Griffin");
//! assert_eq!(resolver.lookup("Missing")?, None);
//! ```

pub mod bridge;
pub mod resolvers;
pub mod settings;

pub use resolvers::{EnvResolver, EnvScope, MapResolver, SettingsResolver};
pub use settings::{SettingsBuilder, SettingsError, SettingsStore, SettingsWatcher};

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Error types for configuration lookups.
///
/// An absent key and a broken backing source are always distinct variants.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// The key has no value in the backing source
    #[error("Configuration key '{key}' not found in source '{provider}'")]
    NotFound {
        /// Key that was looked up
        key: String,
        /// Provider that was searched (e.g. `"env"`)
        provider: &'static str,
    },

    /// The backing source could not be read, reached, or authenticated against
    #[error("Configuration source '{provider}' unavailable: {message}")]
    SourceUnavailable {
        /// Provider that failed
        provider: &'static str,
        /// What went wrong
        message: String,
    },
}

impl ResolveError {
    /// Create a [`ResolveError::NotFound`]
    #[must_use]
    pub fn not_found(key: impl Into<String>, provider: &'static str) -> Self {
        Self::NotFound {
            key: key.into(),
            provider,
        }
    }

    /// Create a [`ResolveError::SourceUnavailable`]
    #[must_use]
    pub fn unavailable(provider: &'static str, message: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            provider,
            message: message.into(),
        }
    }

    /// Whether this error means the key is absent
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether this error means the backing source is broken
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::SourceUnavailable { .. })
    }

    /// Provider the error originated from
    #[must_use]
    pub const fn provider(&self) -> &'static str {
        match self {
            Self::NotFound { provider, .. } | Self::SourceUnavailable { provider, .. } => provider,
        }
    }
}

/// Trait for reading configuration values from a backing source.
///
/// Implementors must provide:
/// - [`lookup`](ConfigResolver::lookup) - indexed lookup, `Ok(None)` when absent
/// - [`source_name`](ConfigResolver::source_name) - provider identifier
///
/// All operations are read-only and idempotent. Resolvers never write to
/// their backing source.
///
/// Sources that are natively asynchronous (a remote vault) override
/// [`lookup_async`](ConfigResolver::lookup_async) and implement `lookup` on top
/// of [`bridge::block_on`]. For synchronous sources the default async path
/// runs the synchronous lookup inline, so awaiting it costs the same as
/// calling it directly.
#[async_trait]
pub trait ConfigResolver: Send + Sync + std::fmt::Debug {
    /// Get the provider name for this resolver.
    ///
    /// Examples: `"settings"`, `"env"`, `"map"`, `"vault"`
    fn source_name(&self) -> &'static str;

    /// Look up a key, returning `Ok(None)` when it is absent.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::SourceUnavailable`] only when the backing
    /// source itself is broken. Never errors for a missing key.
    fn lookup(&self, key: &str) -> Result<Option<String>, ResolveError>;

    /// Get a value by key.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::NotFound`] when the key is absent and
    /// [`ResolveError::SourceUnavailable`] when the source is broken.
    fn get(&self, key: &str) -> Result<String, ResolveError> {
        self.lookup(key)?
            .ok_or_else(|| ResolveError::not_found(key, self.source_name()))
    }

    /// Asynchronous form of [`lookup`](ConfigResolver::lookup).
    async fn lookup_async(&self, key: &str) -> Result<Option<String>, ResolveError> {
        self.lookup(key)
    }

    /// Asynchronous form of [`get`](ConfigResolver::get).
    async fn get_async(&self, key: &str) -> Result<String, ResolveError> {
        self.lookup_async(key)
            .await?
            .ok_or_else(|| ResolveError::not_found(key, self.source_name()))
    }
}

#[async_trait]
impl<R: ConfigResolver + ?Sized> ConfigResolver for Arc<R> {
    fn source_name(&self) -> &'static str {
        (**self).source_name()
    }

    fn lookup(&self, key: &str) -> Result<Option<String>, ResolveError> {
        (**self).lookup(key)
    }

    fn get(&self, key: &str) -> Result<String, ResolveError> {
        (**self).get(key)
    }

    async fn lookup_async(&self, key: &str) -> Result<Option<String>, ResolveError> {
        (**self).lookup_async(key).await
    }

    async fn get_async(&self, key: &str) -> Result<String, ResolveError> {
        (**self).get_async(key).await
    }
}

#[async_trait]
impl<R: ConfigResolver + ?Sized> ConfigResolver for Box<R> {
    fn source_name(&self) -> &'static str {
        (**self).source_name()
    }

    fn lookup(&self, key: &str) -> Result<Option<String>, ResolveError> {
        (**self).lookup(key)
    }

    fn get(&self, key: &str) -> Result<String, ResolveError> {
        (**self).get(key)
    }

    async fn lookup_async(&self, key: &str) -> Result<Option<String>, ResolveError> {
        (**self).lookup_async(key).await
    }

    async fn get_async(&self, key: &str) -> Result<String, ResolveError> {
        (**self).get_async(key).await
    }
}
