//! Hot reload of settings files

use super::{SettingsError, SettingsStore};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

/// Keeps a settings store reloading while alive.
///
/// Returned by [`SettingsStore::watch`]. Dropping it stops the watcher.
pub struct SettingsWatcher {
    _watcher: RecommendedWatcher,
    directories: Vec<PathBuf>,
}

impl std::fmt::Debug for SettingsWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsWatcher")
            .field("directories", &self.directories)
            .finish_non_exhaustive()
    }
}

impl SettingsWatcher {
    /// Directories being watched
    #[must_use]
    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }
}

impl SettingsStore {
    /// Reload this store whenever one of its settings files changes.
    ///
    /// Parent directories are watched rather than the files themselves so
    /// that optional files created later, and editors that replace files on
    /// save, are picked up. A reload that fails keeps the previous values.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Watch`] if the platform watcher cannot be
    /// created or a directory cannot be watched.
    pub fn watch(self: &Arc<Self>) -> Result<SettingsWatcher, SettingsError> {
        let files: Vec<PathBuf> = self.files().iter().map(|p| absolute(p)).collect();
        let directories: Vec<PathBuf> = files
            .iter()
            .filter_map(|file| file.parent().map(Path::to_path_buf))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let store: Weak<Self> = Arc::downgrade(self);
        let watched = files.clone();
        let mut watcher = RecommendedWatcher::new(
            move |result: notify::Result<notify::Event>| match result {
                Ok(event) => {
                    if !matches!(
                        event.kind,
                        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                    ) {
                        return;
                    }
                    if !event.paths.iter().any(|p| watched.contains(p)) {
                        return;
                    }
                    let Some(store) = store.upgrade() else {
                        return;
                    };
                    tracing::debug!(paths = ?event.paths, "Settings file changed");
                    // Failures are logged by reload and the old view is kept
                    let _ = store.reload();
                }
                Err(e) => tracing::warn!(error = %e, "Settings watch error"),
            },
            notify::Config::default(),
        )
        .map_err(|e| SettingsError::Watch {
            message: e.to_string(),
        })?;

        for dir in &directories {
            watcher
                .watch(dir, RecursiveMode::NonRecursive)
                .map_err(|e| SettingsError::Watch {
                    message: format!("{}: {e}", dir.display()),
                })?;
            tracing::info!(directory = %dir.display(), "Watching settings directory");
        }

        Ok(SettingsWatcher {
            _watcher: watcher,
            directories,
        })
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
