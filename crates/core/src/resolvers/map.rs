//! In-memory mapping resolver

use crate::{ConfigResolver, ResolveError};
use std::collections::HashMap;

/// Resolves values from a caller-supplied key/value mapping
///
/// Keys are matched exactly. Useful as a test double and as the terminal
/// resolver of a chain.
#[derive(Debug, Clone, Default)]
pub struct MapResolver {
    values: HashMap<String, String>,
}

impl MapResolver {
    /// Create a resolver from key/value pairs.
    ///
    /// When a key appears more than once the last value wins.
    #[must_use]
    pub fn new<K, V>(values: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Number of keys held
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the mapping is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl From<HashMap<String, String>> for MapResolver {
    fn from(values: HashMap<String, String>) -> Self {
        Self { values }
    }
}

impl ConfigResolver for MapResolver {
    fn source_name(&self) -> &'static str {
        "map"
    }

    fn lookup(&self, key: &str) -> Result<Option<String>, ResolveError> {
        tracing::debug!(provider = "map", key, "Looking up key");
        Ok(self.values.get(key).cloned())
    }
}
