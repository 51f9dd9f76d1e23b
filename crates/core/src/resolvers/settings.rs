//! Layered settings resolver

use crate::settings::{SettingsError, SettingsStore};
use crate::{ConfigResolver, ResolveError};
use std::sync::Arc;

/// Resolves values from a [`SettingsStore`]
///
/// Lookups read the store's current merged view. Reloading is the store's
/// business; a reload shows up here as a different value on the next lookup.
#[derive(Debug, Clone)]
pub struct SettingsResolver {
    store: Arc<SettingsStore>,
}

impl SettingsResolver {
    /// Create a resolver over a shared store
    #[must_use]
    pub const fn new(store: Arc<SettingsStore>) -> Self {
        Self { store }
    }

    /// Build a resolver over a single settings file.
    ///
    /// # Errors
    ///
    /// Returns a [`SettingsError`] if the file cannot be loaded.
    pub fn from_file(
        path: impl Into<std::path::PathBuf>,
        optional: bool,
    ) -> Result<Self, SettingsError> {
        let store = SettingsStore::builder().add_file(path, optional).build()?;
        Ok(Self::new(Arc::new(store)))
    }

    /// The underlying store
    #[must_use]
    pub const fn store(&self) -> &Arc<SettingsStore> {
        &self.store
    }
}

impl From<SettingsStore> for SettingsResolver {
    fn from(store: SettingsStore) -> Self {
        Self::new(Arc::new(store))
    }
}

impl ConfigResolver for SettingsResolver {
    fn source_name(&self) -> &'static str {
        "settings"
    }

    fn lookup(&self, key: &str) -> Result<Option<String>, ResolveError> {
        tracing::debug!(provider = "settings", key, "Looking up key");
        self.store
            .get(key)
            .map_err(|e| ResolveError::unavailable("settings", e.to_string()))
    }
}
