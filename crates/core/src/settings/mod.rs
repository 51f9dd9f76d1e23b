//! Layered settings store
//!
//! A [`SettingsStore`] merges any number of layers (settings files, prefixed
//! environment variables, in-memory defaults) into one flat view keyed by
//! `Section:Key` paths. Later layers override earlier ones and keys compare
//! case-insensitively.
//!
//! The merged view can be rebuilt with [`SettingsStore::reload`], either
//! explicitly or from a file watcher started with [`SettingsStore::watch`].
//! Readers observe a reload only as a changed value on their next lookup.

mod flatten;
mod watch;

pub use flatten::{KEY_DELIMITER, SettingsFormat};
pub use watch::SettingsWatcher;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use thiserror::Error;

/// Error types for building and reloading settings
#[derive(Debug, Error)]
pub enum SettingsError {
    /// A required settings file does not exist
    #[error("Settings file not found: {}", path.display())]
    Missing {
        /// Path of the missing file
        path: PathBuf,
    },

    /// A settings file exists but could not be read
    #[error("Failed to read settings file {}: {source}", path.display())]
    Io {
        /// Path of the file
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// A settings file could not be parsed
    #[error("Failed to parse {format} settings file {}: {message}", path.display())]
    Parse {
        /// Path of the file
        path: PathBuf,
        /// Document format that was expected
        format: &'static str,
        /// Parser error message
        message: String,
    },

    /// The file extension does not name a known format
    #[error("Unsupported settings file format: {} (expected .json, .toml, .yaml or .yml)", path.display())]
    UnsupportedFormat {
        /// Path of the file
        path: PathBuf,
    },

    /// The file watcher could not be started
    #[error("Failed to watch settings files: {message}")]
    Watch {
        /// Watcher error message
        message: String,
    },

    /// A thread panicked while holding the settings view
    #[error("Settings view is poisoned")]
    Poisoned,
}

#[derive(Debug, Clone)]
enum Layer {
    File {
        path: PathBuf,
        optional: bool,
        format: Option<SettingsFormat>,
    },
    Env {
        prefix: String,
    },
    Map(Vec<(String, String)>),
}

impl Layer {
    fn load(&self, into: &mut HashMap<String, String>) -> Result<(), SettingsError> {
        match self {
            Self::File {
                path,
                optional,
                format,
            } => load_file(path, *optional, *format, into),
            Self::Env { prefix } => {
                load_env(prefix, into);
                Ok(())
            }
            Self::Map(pairs) => {
                for (key, value) in pairs {
                    insert(into, key, value.clone());
                }
                Ok(())
            }
        }
    }
}

fn normalize(key: &str) -> String {
    key.to_lowercase()
}

fn insert(view: &mut HashMap<String, String>, key: &str, value: String) {
    view.insert(normalize(key), value);
}

fn load_file(
    path: &Path,
    optional: bool,
    format: Option<SettingsFormat>,
    into: &mut HashMap<String, String>,
) -> Result<(), SettingsError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            if optional {
                tracing::debug!(path = %path.display(), "Optional settings file not present");
                return Ok(());
            }
            return Err(SettingsError::Missing {
                path: path.to_path_buf(),
            });
        }
        Err(source) => {
            return Err(SettingsError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let format = format
        .or_else(|| SettingsFormat::from_path(path))
        .ok_or_else(|| SettingsError::UnsupportedFormat {
            path: path.to_path_buf(),
        })?;
    let document = format.parse(path, &contents)?;
    for (key, value) in flatten::flatten(&document) {
        insert(into, &key, value);
    }
    Ok(())
}

fn load_env(prefix: &str, into: &mut HashMap<String, String>) {
    for (name, value) in std::env::vars_os() {
        let (Some(name), Some(value)) = (name.to_str(), value.to_str()) else {
            continue;
        };
        let Some(head) = name.get(..prefix.len()) else {
            continue;
        };
        if !head.eq_ignore_ascii_case(prefix) {
            continue;
        }
        let key = name[prefix.len()..].replace("__", KEY_DELIMITER);
        if !key.is_empty() {
            insert(into, &key, value.to_string());
        }
    }
}

/// Builder for a [`SettingsStore`]
///
/// Layers are applied in the order they are added.
///
/// ```ignore
/// let store = SettingsStore::builder()
///     .add_file("appsettings.json", true)
///     .add_env("APP_")
///     .build()?;
/// ```
#[derive(Debug, Default, Clone)]
pub struct SettingsBuilder {
    layers: Vec<Layer>,
}

impl SettingsBuilder {
    /// Create an empty builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a settings file whose format follows its extension.
    ///
    /// When `optional` is true a missing file contributes nothing.
    #[must_use]
    pub fn add_file(mut self, path: impl Into<PathBuf>, optional: bool) -> Self {
        self.layers.push(Layer::File {
            path: path.into(),
            optional,
            format: None,
        });
        self
    }

    /// Add a settings file with an explicit format
    #[must_use]
    pub fn add_file_with_format(
        mut self,
        path: impl Into<PathBuf>,
        format: SettingsFormat,
        optional: bool,
    ) -> Self {
        self.layers.push(Layer::File {
            path: path.into(),
            optional,
            format: Some(format),
        });
        self
    }

    /// Add environment variables starting with `prefix`.
    ///
    /// The prefix is stripped and `__` separates sections, so with prefix
    /// `APP_` the variable `APP_Logging__Level` provides `Logging:Level`.
    #[must_use]
    pub fn add_env(mut self, prefix: impl Into<String>) -> Self {
        self.layers.push(Layer::Env {
            prefix: prefix.into(),
        });
        self
    }

    /// Add an in-memory layer
    #[must_use]
    pub fn add_map<K, V>(mut self, values: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.layers.push(Layer::Map(
            values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ));
        self
    }

    /// Load every layer and build the store.
    ///
    /// # Errors
    ///
    /// Returns a [`SettingsError`] if a required file is missing or any file
    /// cannot be read or parsed.
    pub fn build(self) -> Result<SettingsStore, SettingsError> {
        let view = merge(&self.layers)?;
        tracing::debug!(
            layers = self.layers.len(),
            keys = view.len(),
            "Built settings store"
        );
        Ok(SettingsStore {
            layers: self.layers,
            view: RwLock::new(view),
        })
    }
}

fn merge(layers: &[Layer]) -> Result<HashMap<String, String>, SettingsError> {
    let mut view = HashMap::new();
    for layer in layers {
        layer.load(&mut view)?;
    }
    Ok(view)
}

/// Merged, already-resolved view over a stack of settings layers
#[derive(Debug)]
pub struct SettingsStore {
    layers: Vec<Layer>,
    view: RwLock<HashMap<String, String>>,
}

impl SettingsStore {
    /// Start building a store
    #[must_use]
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::new()
    }

    /// Look up a `Section:Key` path, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Poisoned`] if the view lock is poisoned.
    pub fn get(&self, key: &str) -> Result<Option<String>, SettingsError> {
        let view = self.view.read().map_err(|_| SettingsError::Poisoned)?;
        Ok(view.get(&normalize(key)).cloned())
    }

    /// Number of keys in the merged view
    #[must_use]
    pub fn len(&self) -> usize {
        self.view.read().map_or(0, |view| view.len())
    }

    /// Whether the merged view is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Paths of every file layer, in layer order
    #[must_use]
    pub fn files(&self) -> Vec<&Path> {
        self.layers
            .iter()
            .filter_map(|layer| match layer {
                Layer::File { path, .. } => Some(path.as_path()),
                _ => None,
            })
            .collect()
    }

    /// Re-read every layer and swap in the new view.
    ///
    /// On failure the previous view stays in place.
    ///
    /// # Errors
    ///
    /// Returns the [`SettingsError`] of the first layer that failed to load.
    pub fn reload(&self) -> Result<(), SettingsError> {
        let fresh = match merge(&self.layers) {
            Ok(fresh) => fresh,
            Err(e) => {
                tracing::warn!(error = %e, "Settings reload failed, keeping previous values");
                return Err(e);
            }
        };

        let keys = fresh.len();
        *self.view.write().map_err(|_| SettingsError::Poisoned)? = fresh;
        tracing::info!(keys, "Reloaded settings");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_single_json_file() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "appsettings.json",
            r#"{"Name": "Stewie Griffin", "Logging": {"Level": "Warning"}}"#,
        );

        let store = SettingsStore::builder().add_file(path, false).build().unwrap();
        assert_eq!(store.get("Name").unwrap().as_deref(), Some("Stewie Griffin"));
        assert_eq!(store.get("Logging:Level").unwrap().as_deref(), Some("Warning"));
        assert_eq!(store.get("Missing").unwrap(), None);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_toml_datetime_is_a_plain_value() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "app.toml", "Released = 1979-05-27T07:32:00Z\n");

        let store = SettingsStore::builder().add_file(path, false).build().unwrap();
        assert_eq!(
            store.get("Released").unwrap().as_deref(),
            Some("1979-05-27T07:32:00Z")
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_keys_are_case_insensitive() {
        let store = SettingsStore::builder()
            .add_map([("Logging:Level", "Debug")])
            .build()
            .unwrap();
        assert_eq!(store.get("logging:level").unwrap().as_deref(), Some("Debug"));
        assert_eq!(store.get("LOGGING:LEVEL").unwrap().as_deref(), Some("Debug"));
    }

    #[test]
    fn test_later_layers_override_earlier() {
        let dir = TempDir::new().unwrap();
        let base = write(&dir, "base.toml", "Name = \"Peter\"\nColor = \"green\"\n");
        let local = write(&dir, "local.yaml", "Name: Lois\n");

        let store = SettingsStore::builder()
            .add_map([("Name", "default"), ("Only", "defaults")])
            .add_file(base, false)
            .add_file(local, false)
            .build()
            .unwrap();

        assert_eq!(store.get("Name").unwrap().as_deref(), Some("Lois"));
        assert_eq!(store.get("Color").unwrap().as_deref(), Some("green"));
        assert_eq!(store.get("Only").unwrap().as_deref(), Some("defaults"));
    }

    #[test]
    fn test_missing_optional_file_is_tolerated() {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::builder()
            .add_file(dir.path().join("absent.json"), true)
            .build()
            .unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_missing_required_file_fails() {
        let dir = TempDir::new().unwrap();
        let err = SettingsStore::builder()
            .add_file(dir.path().join("absent.json"), false)
            .build()
            .unwrap_err();
        assert!(matches!(err, SettingsError::Missing { .. }));
    }

    #[test]
    fn test_unreadable_file_fails_even_when_optional() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("settings.json");
        std::fs::create_dir(&sub).unwrap();
        let err = SettingsStore::builder()
            .add_file(sub, true)
            .build()
            .unwrap_err();
        assert!(matches!(err, SettingsError::Io { .. }));
    }

    #[test]
    fn test_unknown_extension_fails() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "settings.ini", "Name=Chris\n");
        let err = SettingsStore::builder()
            .add_file(path.clone(), false)
            .build()
            .unwrap_err();
        assert!(matches!(err, SettingsError::UnsupportedFormat { .. }));

        let err = SettingsStore::builder()
            .add_file_with_format(path, SettingsFormat::Toml, false)
            .build()
            .unwrap_err();
        // `Name=Chris` is not valid TOML (unquoted string)
        assert!(matches!(err, SettingsError::Parse { .. }));
    }

    #[test]
    fn test_env_layer_strips_prefix_and_maps_sections() {
        temp_env::with_vars(
            [
                ("CONFLUXTEST_Name", Some("Quagmire")),
                ("CONFLUXTEST_Logging__Level", Some("Trace")),
                ("OTHER_Name", Some("ignored")),
            ],
            || {
                let store = SettingsStore::builder()
                    .add_map([("Name", "default")])
                    .add_env("CONFLUXTEST_")
                    .build()
                    .unwrap();
                assert_eq!(store.get("Name").unwrap().as_deref(), Some("Quagmire"));
                assert_eq!(store.get("Logging:Level").unwrap().as_deref(), Some("Trace"));
                assert_eq!(store.get("OTHER_Name").unwrap(), None);
            },
        );
    }

    #[test]
    fn test_reload_picks_up_file_changes() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "appsettings.json", r#"{"Name": "Meg"}"#);
        let store = SettingsStore::builder()
            .add_file(path.clone(), false)
            .build()
            .unwrap();
        assert_eq!(store.get("Name").unwrap().as_deref(), Some("Meg"));

        std::fs::write(&path, r#"{"Name": "Chris", "Age": 16}"#).unwrap();
        // Not observed until reload
        assert_eq!(store.get("Name").unwrap().as_deref(), Some("Meg"));

        store.reload().unwrap();
        assert_eq!(store.get("Name").unwrap().as_deref(), Some("Chris"));
        assert_eq!(store.get("Age").unwrap().as_deref(), Some("16"));
    }

    #[test]
    fn test_failed_reload_keeps_previous_view() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "appsettings.json", r#"{"Name": "Meg"}"#);
        let store = SettingsStore::builder()
            .add_file(path.clone(), false)
            .build()
            .unwrap();

        std::fs::write(&path, "{ truncated").unwrap();
        assert!(matches!(store.reload(), Err(SettingsError::Parse { .. })));
        assert_eq!(store.get("Name").unwrap().as_deref(), Some("Meg"));
    }

    #[test]
    fn test_files_lists_file_layers() {
        let store = SettingsStore::builder()
            .add_map([("a", "b")])
            .add_file("/nonexistent/one.json", true)
            .add_env("X_")
            .add_file("/nonexistent/two.yaml", true)
            .build()
            .unwrap();
        assert_eq!(
            store.files(),
            vec![
                Path::new("/nonexistent/one.json"),
                Path::new("/nonexistent/two.yaml")
            ]
        );
    }
}
