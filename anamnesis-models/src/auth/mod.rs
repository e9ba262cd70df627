//! Credential management for API keys.
//!
//! API keys never live in config files. They are read from the system
//! keyring, or from the environment when fallback is enabled.
//!
//! # Example
//!
//! ```ignore
//! use anamnesis_models::auth::CredentialStore;
//!
//! let store = CredentialStore::new("anamnesis").with_env_fallback();
//!
//! // Store a key in the system keyring
//! store.set("openai", "sk-...")?;
//!
//! // Retrieve it (checks keyring first, then API_KEY and OPENAI_API_KEY)
//! let key = store.get("openai")?;
//! ```

use std::env;

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::{Error, Result};

/// A secure API key that prevents accidental logging.
///
/// The key is wrapped in `SecretString` which:
/// - Implements `Debug` as `"[REDACTED]"`
/// - Zeroizes memory on drop
/// - Requires explicit `.expose_secret()` to access the value
#[derive(Clone)]
pub struct ApiKey(SecretString);

impl ApiKey {
    /// Create a new API key from a string.
    pub fn new(key: impl Into<String>) -> Self {
        Self(SecretString::from(key.into()))
    }

    /// Expose the secret key value.
    ///
    /// Use sparingly - only when actually sending to an API.
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ApiKey([REDACTED])")
    }
}

impl From<String> for ApiKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for ApiKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Provider-independent key variable, checked before the provider's own.
pub const GENERIC_ENV_VAR: &str = "API_KEY";

/// Environment variable names for each provider.
const ENV_VARS: &[(&str, &str)] = &[
    ("openai", "OPENAI_API_KEY"),
    ("deepseek", "DEEPSEEK_API_KEY"),
    ("dashscope", "DASHSCOPE_API_KEY"),
    ("ollama", "OLLAMA_API_KEY"),
];

/// Get the environment variable name for a provider.
pub fn env_var_for_provider(provider: &str) -> Option<&'static str> {
    ENV_VARS
        .iter()
        .find(|(p, _)| *p == provider)
        .map(|(_, v)| *v)
}

/// Resolve a key from `lookup`, generic variable first.
fn key_from_env(provider: &str, lookup: impl Fn(&str) -> Option<String>) -> Option<ApiKey> {
    std::iter::once(GENERIC_ENV_VAR)
        .chain(env_var_for_provider(provider))
        .filter_map(|var| lookup(var))
        .find(|value| !value.trim().is_empty())
        .map(ApiKey::new)
}

/// Source of a stored credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Stored in system keyring.
    Keyring,
    /// From environment variable.
    Environment,
}

/// Credential storage with system keyring and environment fallback.
///
/// Lookups try the keyring first, then (with fallback enabled) `API_KEY`
/// and the provider's own variable. Writes always go to the keyring.
pub struct CredentialStore {
    service_name: String,
    env_fallback: bool,
}

impl CredentialStore {
    /// Create a new credential store for keyring service `service_name`.
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            env_fallback: false,
        }
    }

    /// Enable environment variable fallback.
    pub fn with_env_fallback(mut self) -> Self {
        self.env_fallback = true;
        self
    }

    /// Get an API key for a provider.
    ///
    /// # Errors
    ///
    /// Returns `Error::CredentialsNotFound` if no credentials are found.
    pub fn get(&self, provider: &str) -> Result<ApiKey> {
        self.find(provider)
            .map(|(key, _)| key)
            .ok_or_else(|| Error::CredentialsNotFound(provider.to_string()))
    }

    /// Like [`get`](Self::get), but a missing key is `None`.
    ///
    /// Local providers often run without a key.
    pub fn get_optional(&self, provider: &str) -> Option<ApiKey> {
        self.find(provider).map(|(key, _)| key)
    }

    /// Store an API key for a provider in the system keyring.
    ///
    /// # Errors
    ///
    /// Returns `Error::Keyring` if the keyring operation fails.
    pub fn set(&self, provider: &str, key: &str) -> Result<()> {
        let entry = self.keyring_entry(provider)?;
        entry
            .set_password(key)
            .map_err(|e| Error::Keyring(e.to_string()))?;
        debug!(provider, "stored API key in keyring");
        Ok(())
    }

    /// Delete an API key from the system keyring.
    ///
    /// # Errors
    ///
    /// Returns `Error::CredentialsNotFound` if no credentials exist, or
    /// `Error::Keyring` if the keyring operation fails.
    pub fn delete(&self, provider: &str) -> Result<()> {
        let entry = self.keyring_entry(provider)?;
        entry.delete_credential().map_err(|e| match e {
            keyring::Error::NoEntry => Error::CredentialsNotFound(provider.to_string()),
            _ => Error::Keyring(e.to_string()),
        })?;
        debug!(provider, "deleted API key from keyring");
        Ok(())
    }

    /// Where the key for `provider` would come from, if anywhere.
    pub fn credential_source(&self, provider: &str) -> Option<CredentialSource> {
        self.find(provider).map(|(_, source)| source)
    }

    fn find(&self, provider: &str) -> Option<(ApiKey, CredentialSource)> {
        if let Some(key) = self.get_from_keyring(provider) {
            debug!(provider, "retrieved API key from keyring");
            return Some((key, CredentialSource::Keyring));
        }
        if self.env_fallback
            && let Some(key) = key_from_env(provider, |var| env::var(var).ok())
        {
            debug!(provider, "retrieved API key from environment");
            return Some((key, CredentialSource::Environment));
        }
        None
    }

    fn keyring_entry(&self, provider: &str) -> Result<keyring::Entry> {
        keyring::Entry::new(&self.service_name, provider).map_err(|e| Error::Keyring(e.to_string()))
    }

    fn get_from_keyring(&self, provider: &str) -> Option<ApiKey> {
        let entry = self.keyring_entry(provider).ok()?;
        entry.get_password().ok().map(ApiKey::new)
    }
}
