//! Environment variable resolver

use crate::{ConfigResolver, ResolveError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Machine-wide environment file read by `pam_env` at login.
const MACHINE_ENVIRONMENT_FILE: &str = "/etc/environment";

/// Scope an [`EnvResolver`] reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvScope {
    /// The current process environment
    #[default]
    Process,
    /// Per-user environment (`$XDG_CONFIG_HOME/environment.d/*.conf`)
    User,
    /// Machine-wide environment (`/etc/environment`)
    Machine,
}

impl EnvScope {
    /// Lowercase scope name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Process => "process",
            Self::User => "user",
            Self::Machine => "machine",
        }
    }
}

impl std::fmt::Display for EnvScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EnvScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "process" => Ok(Self::Process),
            "user" => Ok(Self::User),
            "machine" => Ok(Self::Machine),
            other => Err(format!(
                "unknown environment scope '{other}' (expected process, user or machine)"
            )),
        }
    }
}

#[derive(Debug, Clone)]
enum ScopeSource {
    Process,
    /// Every `*.conf` file in a directory, in file name order
    Directory(PathBuf),
    /// Environment files, later files override earlier ones
    Files(Vec<PathBuf>),
}

/// Resolves values from environment variables at a fixed [`EnvScope`]
///
/// Every lookup reads the live environment; nothing is captured at
/// construction. A variable set at one scope is never visible through
/// another.
#[derive(Debug, Clone)]
pub struct EnvResolver {
    scope: EnvScope,
    source: ScopeSource,
}

impl EnvResolver {
    /// Create a resolver for `scope` using the platform locations.
    #[must_use]
    pub fn new(scope: EnvScope) -> Self {
        let source = match scope {
            EnvScope::Process => ScopeSource::Process,
            EnvScope::User => dirs::config_dir().map_or_else(
                || ScopeSource::Files(Vec::new()),
                |dir| ScopeSource::Directory(dir.join("environment.d")),
            ),
            EnvScope::Machine => ScopeSource::Files(vec![PathBuf::from(MACHINE_ENVIRONMENT_FILE)]),
        };
        Self { scope, source }
    }

    /// Create a resolver for the process environment
    #[must_use]
    pub fn process() -> Self {
        Self::new(EnvScope::Process)
    }

    /// Create a file-backed resolver for `scope` reading the given files.
    ///
    /// Later files override earlier ones. A [`EnvScope::Process`] scope
    /// ignores `files` and reads the process environment.
    #[must_use]
    pub fn with_files(scope: EnvScope, files: impl IntoIterator<Item = PathBuf>) -> Self {
        let source = match scope {
            EnvScope::Process => ScopeSource::Process,
            EnvScope::User | EnvScope::Machine => ScopeSource::Files(files.into_iter().collect()),
        };
        Self { scope, source }
    }

    /// Scope this resolver reads from
    #[must_use]
    pub const fn scope(&self) -> EnvScope {
        self.scope
    }

    fn lookup_process(key: &str) -> Result<Option<String>, ResolveError> {
        match std::env::var_os(key) {
            None => Ok(None),
            Some(value) => value.into_string().map(Some).map_err(|_| {
                ResolveError::unavailable("env", format!("Variable '{key}' is not valid UTF-8"))
            }),
        }
    }

    fn lookup_files(files: &[PathBuf], key: &str) -> Result<Option<String>, ResolveError> {
        let mut found = None;
        for file in files {
            if let Some(value) = read_environment_file(file)?
                .into_iter()
                .rev()
                .find_map(|(k, v)| (k == key).then_some(v))
            {
                found = Some(value);
            }
        }
        Ok(found)
    }
}

#[async_trait]
impl ConfigResolver for EnvResolver {
    fn source_name(&self) -> &'static str {
        "env"
    }

    fn lookup(&self, key: &str) -> Result<Option<String>, ResolveError> {
        tracing::debug!(provider = "env", scope = %self.scope, key, "Looking up key");
        match &self.source {
            ScopeSource::Process => Self::lookup_process(key),
            ScopeSource::Directory(dir) => Self::lookup_files(&environment_files_in(dir)?, key),
            ScopeSource::Files(files) => Self::lookup_files(files, key),
        }
    }

    /// File scopes read from disk on the blocking pool so the calling
    /// runtime thread keeps serving other tasks.
    async fn lookup_async(&self, key: &str) -> Result<Option<String>, ResolveError> {
        if matches!(self.source, ScopeSource::Process) {
            return self.lookup(key);
        }

        let resolver = self.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || resolver.lookup(&key))
            .await
            .map_err(|e| {
                ResolveError::unavailable("env", format!("Environment file read failed: {e}"))
            })?
    }
}

/// `*.conf` files in a systemd `environment.d` directory, sorted by name
fn environment_files_in(dir: &Path) -> Result<Vec<PathBuf>, ResolveError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(ResolveError::unavailable(
                "env",
                format!("Failed to list {}: {e}", dir.display()),
            ));
        }
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "conf"))
        .collect();
    files.sort();
    Ok(files)
}

/// Read `KEY=VALUE` pairs from an environment file.
///
/// A missing file yields no pairs. Any other I/O failure makes the scope
/// unavailable.
fn read_environment_file(path: &Path) -> Result<Vec<(String, String)>, ResolveError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(parse_environment(&contents)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(ResolveError::unavailable(
            "env",
            format!("Failed to read {}: {e}", path.display()),
        )),
    }
}

fn parse_environment(contents: &str) -> Vec<(String, String)> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), unquote(value.trim()).to_string()))
        })
        .collect()
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_resolve_from_process_env() {
        temp_env::with_var("CONFLUX_TEST_ENV_1", Some("value1"), || {
            let resolver = EnvResolver::process();
            assert_eq!(resolver.get("CONFLUX_TEST_ENV_1").unwrap(), "value1");
        });
    }

    #[test]
    fn test_missing_process_var() {
        let resolver = EnvResolver::new(EnvScope::Process);
        let result = resolver.get("CONFLUX_NONEXISTENT_ENV_VAR_12345");
        assert!(matches!(result, Err(ResolveError::NotFound { .. })));
    }

    #[test]
    fn test_reflects_live_process_state() {
        temp_env::with_var_unset("Name", || {
            let resolver = EnvResolver::new(EnvScope::Process);
            assert_eq!(resolver.lookup("Name").unwrap(), None);

            temp_env::with_var("Name", Some("Brian"), || {
                assert_eq!(resolver.get("Name").unwrap(), "Brian");
            });
        });
    }

    #[test]
    fn test_process_value_invisible_at_other_scopes() {
        let dir = TempDir::new().unwrap();
        let user_file = dir.path().join("user.conf");
        let machine_file = dir.path().join("environment");

        temp_env::with_var("CONFLUX_SCOPE_ISOLATION", Some("process-only"), || {
            let user = EnvResolver::with_files(EnvScope::User, [user_file.clone()]);
            let machine = EnvResolver::with_files(EnvScope::Machine, [machine_file.clone()]);

            assert!(user.get("CONFLUX_SCOPE_ISOLATION").unwrap_err().is_not_found());
            assert!(machine.get("CONFLUX_SCOPE_ISOLATION").unwrap_err().is_not_found());
        });
    }

    #[test]
    fn test_file_scope_reads_live_file() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "environment", "# machine\nLANG=C\n");
        let resolver = EnvResolver::with_files(EnvScope::Machine, [path.clone()]);

        assert_eq!(resolver.get("LANG").unwrap(), "C");
        assert_eq!(resolver.lookup("Name").unwrap(), None);

        std::fs::write(&path, "LANG=C\nName=Brian\n").unwrap();
        assert_eq!(resolver.get("Name").unwrap(), "Brian");
    }

    #[test]
    fn test_later_files_override_earlier() {
        let dir = TempDir::new().unwrap();
        let first = write_file(&dir, "10-base.conf", "EDITOR=vi\nPAGER=less\n");
        let second = write_file(&dir, "20-override.conf", "EDITOR=hx\n");
        let resolver = EnvResolver::with_files(EnvScope::User, [first, second]);

        assert_eq!(resolver.get("EDITOR").unwrap(), "hx");
        assert_eq!(resolver.get("PAGER").unwrap(), "less");
    }

    #[test]
    fn test_directory_scope_enumerates_conf_files_per_lookup() {
        let dir = TempDir::new().unwrap();
        let resolver = EnvResolver {
            scope: EnvScope::User,
            source: ScopeSource::Directory(dir.path().to_path_buf()),
        };
        assert_eq!(resolver.lookup("EDITOR").unwrap(), None);

        write_file(&dir, "10-base.conf", "EDITOR=vi\n");
        write_file(&dir, "ignored.txt", "EDITOR=nano\n");
        assert_eq!(resolver.get("EDITOR").unwrap(), "vi");

        write_file(&dir, "20-local.conf", "EDITOR=hx\n");
        assert_eq!(resolver.get("EDITOR").unwrap(), "hx");
    }

    #[test]
    fn test_missing_directory_is_not_found() {
        let resolver = EnvResolver {
            scope: EnvScope::User,
            source: ScopeSource::Directory(PathBuf::from("/nonexistent/conflux/environment.d")),
        };
        assert!(resolver.get("EDITOR").unwrap_err().is_not_found());
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let resolver =
            EnvResolver::with_files(EnvScope::Machine, [PathBuf::from("/nonexistent/conflux/env")]);
        assert!(resolver.get("PATH").unwrap_err().is_not_found());
    }

    #[test]
    fn test_unreadable_file_is_unavailable() {
        let dir = TempDir::new().unwrap();
        // A directory cannot be read as a file
        let resolver = EnvResolver::with_files(EnvScope::User, [dir.path().to_path_buf()]);
        assert!(resolver.lookup("PATH").unwrap_err().is_unavailable());
    }

    #[test]
    fn test_parse_environment_syntax() {
        let pairs = parse_environment(
            "\n# comment\nexport A=1\nB = \"two words\"\nC='single'\nD=\nnot a pair\n=orphan\nE=a=b\n",
        );
        assert_eq!(
            pairs,
            vec![
                ("A".to_string(), "1".to_string()),
                ("B".to_string(), "two words".to_string()),
                ("C".to_string(), "single".to_string()),
                ("D".to_string(), String::new()),
                ("E".to_string(), "a=b".to_string()),
            ]
        );
    }

    #[test]
    fn test_duplicate_key_in_one_file_last_wins() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "environment", "K=first\nK=second\n");
        let resolver = EnvResolver::with_files(EnvScope::Machine, [path]);
        assert_eq!(resolver.get("K").unwrap(), "second");
    }

    #[test]
    fn test_scope_parse_and_display() {
        assert_eq!("Process".parse::<EnvScope>().unwrap(), EnvScope::Process);
        assert_eq!("user".parse::<EnvScope>().unwrap(), EnvScope::User);
        assert_eq!("MACHINE".parse::<EnvScope>().unwrap(), EnvScope::Machine);
        assert!("global".parse::<EnvScope>().is_err());
        assert_eq!(EnvScope::Machine.to_string(), "machine");
        assert_eq!(EnvResolver::new(EnvScope::User).scope(), EnvScope::User);
    }

    #[tokio::test]
    async fn test_async_lookup_matches_sync() {
        temp_env::async_with_vars([("CONFLUX_TEST_ENV_ASYNC", Some("v"))], async {
            let resolver = EnvResolver::process();
            assert_eq!(resolver.get_async("CONFLUX_TEST_ENV_ASYNC").await.unwrap(), "v");
        })
        .await;
    }

    #[tokio::test]
    async fn test_async_file_scope_lookup() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("environment");
        std::fs::write(&file, "Name=Stewie Griffin\n").unwrap();

        let resolver = EnvResolver::with_files(EnvScope::Machine, [file]);
        assert_eq!(resolver.get_async("Name").await.unwrap(), "Stewie Griffin");
        assert_eq!(resolver.lookup_async("Missing").await.unwrap(), None);
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "current_thread")]
    async fn test_pending_file_read_does_not_stall_runtime() {
        let dir = TempDir::new().unwrap();
        let fifo = dir.path().join("environment");
        let status = std::process::Command::new("mkfifo")
            .arg(&fifo)
            .status()
            .unwrap();
        assert!(status.success());

        // Opening the fifo for reading blocks until this writer shows up
        let writer_path = fifo.clone();
        let writer = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(300));
            std::fs::write(writer_path, "X=1\n").unwrap();
        });

        let resolver = EnvResolver::with_files(EnvScope::Machine, [fifo]);
        let lookup = tokio::spawn(async move { resolver.lookup_async("X").await });

        let mut ticks = 0;
        while !lookup.is_finished() {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            ticks += 1;
        }

        assert_eq!(lookup.await.unwrap().unwrap().as_deref(), Some("1"));
        writer.join().unwrap();
        assert!(ticks >= 5, "runtime stalled during file read ({ticks} ticks)");
    }
}
