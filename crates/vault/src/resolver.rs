//! Vault-backed configuration resolver

use crate::{HttpVaultBackend, SecretClient, VaultAuth, VaultBackend, VaultSettings};
use async_trait::async_trait;
use conflux_core::{ConfigResolver, ResolveError, bridge};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Resolves values from `HashiCorp` Vault KV v2 secrets
///
/// A lookup of `key` reads the secret at [`VaultSettings::secret_path`] and
/// returns its [`field`](VaultSettings::field). A missing secret or field is
/// an absent key; every other failure makes the source unavailable.
///
/// Authentication is lazy: the first lookup gathers credentials (from the
/// environment, or from the inner resolver for [`VaultAuth::AppRole`]),
/// performs one handshake and keeps the authenticated client for the life of
/// the resolver. Concurrent first lookups share a single handshake. A failed
/// handshake is not remembered and the next lookup tries again.
///
/// Every remote call is bounded by [`VaultSettings::timeout`] and retried
/// [`VaultSettings::retries`] times on failure. Absent keys are not retried.
pub struct VaultResolver {
    settings: VaultSettings,
    auth: VaultAuth,
    backend: Arc<dyn VaultBackend>,
    client: OnceCell<Arc<dyn SecretClient>>,
}

impl std::fmt::Debug for VaultResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultResolver")
            .field("address", &self.settings.address)
            .field("auth", &self.auth.method())
            .field("authenticated", &self.client.initialized())
            .finish_non_exhaustive()
    }
}

impl VaultResolver {
    /// Create a resolver using ambient credentials (`VAULT_TOKEN` or
    /// `~/.vault-token`)
    #[must_use]
    pub fn ambient(settings: VaultSettings) -> Self {
        let backend = Arc::new(HttpVaultBackend::new(settings.clone()));
        Self::with_backend(settings, VaultAuth::Ambient, backend)
    }

    /// Create a resolver that logs in with an AppRole whose role id and
    /// secret id are read from `credentials` under `ClientId` and
    /// `ClientSecret`
    #[must_use]
    pub fn app_role(settings: VaultSettings, credentials: Arc<dyn ConfigResolver>) -> Self {
        let backend = Arc::new(HttpVaultBackend::new(settings.clone()));
        Self::with_backend(settings, VaultAuth::app_role(credentials), backend)
    }

    /// Create a resolver with an explicit authentication mode and backend
    #[must_use]
    pub fn with_backend(
        settings: VaultSettings,
        auth: VaultAuth,
        backend: Arc<dyn VaultBackend>,
    ) -> Self {
        Self {
            settings,
            auth,
            backend,
            client: OnceCell::new(),
        }
    }

    /// Settings this resolver was built with
    #[must_use]
    pub const fn settings(&self) -> &VaultSettings {
        &self.settings
    }

    /// Whether the authenticated client has been created yet
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.client.initialized()
    }

    /// The authenticated client, performing the handshake on first use
    async fn client(&self) -> Result<&Arc<dyn SecretClient>, ResolveError> {
        self.client
            .get_or_try_init(|| async {
                // Credentials are complete before any remote call is attempted
                let login = self.auth.login().await?;
                tracing::info!(
                    address = %self.settings.address,
                    method = login.method(),
                    "Authenticating to Vault"
                );
                self.call("authenticate", || self.backend.connect(&login))
                    .await
            })
            .await
    }

    /// Run a remote call with the configured timeout and retries
    async fn call<T, F, Fut>(&self, operation: &'static str, mut f: F) -> Result<T, ResolveError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, ResolveError>> + Send,
        T: Send,
    {
        let timeout = self.settings.timeout();
        let mut attempt = 0;
        loop {
            let result = tokio::time::timeout(timeout, f())
                .await
                .unwrap_or_else(|_| {
                    Err(ResolveError::unavailable(
                        "vault",
                        format!("Vault {operation} timed out after {timeout:?}"),
                    ))
                });

            match result {
                Err(e) if e.is_unavailable() && attempt < self.settings.retries => {
                    let delay = self.settings.backoff(attempt);
                    attempt += 1;
                    tracing::warn!(
                        operation,
                        attempt,
                        retries = self.settings.retries,
                        ?delay,
                        error = %e,
                        "Vault call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }
}

#[async_trait]
impl ConfigResolver for VaultResolver {
    fn source_name(&self) -> &'static str {
        "vault"
    }

    fn lookup(&self, key: &str) -> Result<Option<String>, ResolveError> {
        bridge::block_on("vault", self.lookup_async(key))?
    }

    async fn lookup_async(&self, key: &str) -> Result<Option<String>, ResolveError> {
        let client = self.client().await?;
        tracing::debug!(provider = "vault", key, "Looking up key");
        self.call("read", || client.read(key)).await
    }
}
