//! Vault authentication inputs

use conflux_core::{ConfigResolver, ResolveError};
use secrecy::{ExposeSecret, SecretString};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Key names an AppRole-authenticated resolver reads from its credential source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialKeys {
    /// Key holding the AppRole role id
    pub client_id: String,
    /// Key holding the AppRole secret id
    pub client_secret: String,
}

impl Default for CredentialKeys {
    fn default() -> Self {
        Self {
            client_id: "ClientId".to_string(),
            client_secret: "ClientSecret".to_string(),
        }
    }
}

/// An application identifier and its secret
#[derive(Debug)]
pub struct Credentials {
    /// AppRole role id
    pub client_id: String,
    /// AppRole secret id
    pub client_secret: SecretString,
}

impl Credentials {
    /// Create credentials
    #[must_use]
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::from(client_secret.into()),
        }
    }

    /// Read both halves from `source`.
    ///
    /// # Errors
    ///
    /// Any failure, including an absent key, is reported as
    /// [`ResolveError::SourceUnavailable`] for the vault: without complete
    /// credentials the vault cannot be reached.
    pub async fn from_resolver(
        source: &dyn ConfigResolver,
        keys: &CredentialKeys,
    ) -> Result<Self, ResolveError> {
        let client_id = read_credential(source, &keys.client_id).await?;
        let client_secret = read_credential(source, &keys.client_secret).await?;
        Ok(Self::new(client_id, client_secret))
    }
}

async fn read_credential(source: &dyn ConfigResolver, key: &str) -> Result<String, ResolveError> {
    source.get_async(key).await.map_err(|e| {
        ResolveError::unavailable(
            "vault",
            format!(
                "Failed to read credential '{key}' from {}: {e}",
                source.source_name()
            ),
        )
    })
}

/// How a [`VaultResolver`](crate::VaultResolver) authenticates
#[derive(Debug, Clone)]
pub enum VaultAuth {
    /// Use the token discovered from the environment (see [`discover_token`])
    Ambient,
    /// Log in with an AppRole whose credentials come from another resolver
    AppRole {
        /// Resolver supplying the role id and secret id
        credentials: Arc<dyn ConfigResolver>,
        /// Keys to read from `credentials`
        keys: CredentialKeys,
    },
}

impl VaultAuth {
    /// AppRole authentication reading the default `ClientId`/`ClientSecret` keys
    #[must_use]
    pub fn app_role(credentials: Arc<dyn ConfigResolver>) -> Self {
        Self::AppRole {
            credentials,
            keys: CredentialKeys::default(),
        }
    }

    /// Name of the method for logs
    #[must_use]
    pub const fn method(&self) -> &'static str {
        match self {
            Self::Ambient => "ambient",
            Self::AppRole { .. } => "approle",
        }
    }

    /// Gather everything needed to log in.
    ///
    /// Performs no remote calls; the inner resolver (if any) is consulted here.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::SourceUnavailable`] if no token can be found or
    /// the credential source cannot supply both values.
    pub async fn login(&self) -> Result<Login, ResolveError> {
        match self {
            Self::Ambient => discover_token().map(Login::Token),
            Self::AppRole { credentials, keys } => {
                Credentials::from_resolver(credentials.as_ref(), keys)
                    .await
                    .map(Login::AppRole)
            }
        }
    }
}

/// Material for one authentication handshake
#[derive(Debug)]
pub enum Login {
    /// An existing Vault token
    Token(SecretString),
    /// AppRole role id and secret id
    AppRole(Credentials),
}

impl Login {
    /// Name of the method for logs
    #[must_use]
    pub const fn method(&self) -> &'static str {
        match self {
            Self::Token(_) => "token",
            Self::AppRole(_) => "approle",
        }
    }
}

/// Find the Vault token the `vault` CLI would use.
///
/// Checks `VAULT_TOKEN`, then `~/.vault-token`.
///
/// # Errors
///
/// Returns [`ResolveError::SourceUnavailable`] if neither provides a token.
pub fn discover_token() -> Result<SecretString, ResolveError> {
    let token_file = dirs::home_dir().map(|home| home.join(".vault-token"));
    discover_token_from(std::env::var("VAULT_TOKEN").ok(), token_file.as_deref())
}

fn discover_token_from(
    env_token: Option<String>,
    token_file: Option<&Path>,
) -> Result<SecretString, ResolveError> {
    if let Some(token) = env_token.filter(|t| !t.trim().is_empty()) {
        tracing::debug!("Using Vault token from VAULT_TOKEN");
        return Ok(SecretString::from(token.trim().to_string()));
    }

    if let Some(path) = token_file {
        match std::fs::read_to_string(path) {
            Ok(contents) if !contents.trim().is_empty() => {
                tracing::debug!(path = %path.display(), "Using Vault token from token file");
                return Ok(SecretString::from(contents.trim().to_string()));
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(ResolveError::unavailable(
                    "vault",
                    format!("Failed to read {}: {e}", path.display()),
                ));
            }
        }
    }

    Err(ResolveError::unavailable(
        "vault",
        format!(
            "No Vault token found: set VAULT_TOKEN or log in with the vault CLI ({})",
            token_file.map_or_else(|| PathBuf::from("~/.vault-token"), Path::to_path_buf).display()
        ),
    ))
}

impl PartialEq for Credentials {
    fn eq(&self, other: &Self) -> bool {
        self.client_id == other.client_id
            && self.client_secret.expose_secret() == other.client_secret.expose_secret()
    }
}
