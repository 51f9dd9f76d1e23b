//! Remote Vault access
//!
//! [`VaultBackend`] performs the authentication handshake and hands back a
//! [`SecretClient`] bound to the resulting token. [`HttpVaultBackend`] talks
//! to a real server through `vaultrs`.

use crate::{Login, VaultSettings};
use async_trait::async_trait;
use conflux_core::ResolveError;
use secrecy::ExposeSecret;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use vaultrs::client::{Client, VaultClient, VaultClientSettingsBuilder};
use vaultrs::error::ClientError;

/// Authenticates against Vault
#[async_trait]
pub trait VaultBackend: Send + Sync + std::fmt::Debug {
    /// Perform one authentication handshake.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::SourceUnavailable`] if Vault rejects the login
    /// or cannot be reached.
    async fn connect(&self, login: &Login) -> Result<Arc<dyn SecretClient>, ResolveError>;
}

/// Reads secrets with an authenticated session
#[async_trait]
pub trait SecretClient: Send + Sync + std::fmt::Debug {
    /// Read the value stored for `key`, `Ok(None)` if there is none.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::SourceUnavailable`] on any remote failure
    /// other than the secret not existing.
    async fn read(&self, key: &str) -> Result<Option<String>, ResolveError>;
}

/// [`VaultBackend`] for a Vault server over HTTP
#[derive(Debug, Clone)]
pub struct HttpVaultBackend {
    settings: VaultSettings,
}

impl HttpVaultBackend {
    /// Create a backend for the server described by `settings`
    #[must_use]
    pub const fn new(settings: VaultSettings) -> Self {
        Self { settings }
    }

    fn build_client(&self) -> Result<VaultClient, ResolveError> {
        // Malformed addresses must be rejected before they reach the settings builder
        url::Url::parse(&self.settings.address).map_err(|e| {
            ResolveError::unavailable(
                "vault",
                format!("Invalid Vault address '{}': {e}", self.settings.address),
            )
        })?;

        let settings = VaultClientSettingsBuilder::default()
            .address(&self.settings.address)
            .build()
            .map_err(|e| {
                ResolveError::unavailable("vault", format!("Failed to build Vault client: {e}"))
            })?;

        VaultClient::new(settings).map_err(|e| {
            ResolveError::unavailable("vault", format!("Failed to create Vault client: {e}"))
        })
    }
}

#[async_trait]
impl VaultBackend for HttpVaultBackend {
    async fn connect(&self, login: &Login) -> Result<Arc<dyn SecretClient>, ResolveError> {
        let mut client = self.build_client()?;

        match login {
            Login::Token(token) => {
                client.set_token(token.expose_secret());
                // Validate the token up front so a bad one fails the handshake
                vaultrs::token::lookup_self(&client)
                    .await
                    .map_err(|e| remote_error("Vault token lookup", &e))?;
            }
            Login::AppRole(credentials) => {
                let auth = vaultrs::auth::approle::login(
                    &client,
                    &self.settings.approle_mount,
                    &credentials.client_id,
                    credentials.client_secret.expose_secret(),
                )
                .await
                .map_err(|e| remote_error("AppRole login", &e))?;
                client.set_token(&auth.client_token);
            }
        }

        tracing::debug!(
            address = %self.settings.address,
            method = login.method(),
            "Vault session established"
        );

        Ok(Arc::new(HttpSecretClient {
            client,
            settings: self.settings.clone(),
        }))
    }
}

/// Authenticated `vaultrs` client reading KV v2 secrets
struct HttpSecretClient {
    client: VaultClient,
    settings: VaultSettings,
}

impl std::fmt::Debug for HttpSecretClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSecretClient")
            .field("address", &self.settings.address)
            .field("mount", &self.settings.mount)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SecretClient for HttpSecretClient {
    async fn read(&self, key: &str) -> Result<Option<String>, ResolveError> {
        let path = self.settings.secret_path(key);
        let secret: HashMap<String, Value> =
            match vaultrs::kv2::read(&self.client, &self.settings.mount, &path).await {
                Ok(secret) => secret,
                Err(e) if is_not_found(&e) => return Ok(None),
                Err(e) => {
                    return Err(remote_error(
                        &format!("Vault read of '{}'", self.settings.full_path(key)),
                        &e,
                    ));
                }
            };

        Ok(secret.get(&self.settings.field).map(field_to_string))
    }
}

const fn is_not_found(error: &ClientError) -> bool {
    matches!(error, ClientError::APIError { code: 404, .. })
}

fn remote_error(operation: &str, error: &ClientError) -> ResolveError {
    ResolveError::unavailable("vault", format!("{operation} failed: {error}"))
}

fn field_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
