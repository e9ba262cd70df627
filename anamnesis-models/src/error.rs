//! Error types for model providers.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to a provider.
#[derive(Debug, Error)]
pub enum Error {
    /// Provider kind not known to the registry.
    #[error("provider not found: {0}")]
    ProviderNotFound(String),

    /// Credentials not found for provider.
    #[error("credentials not found for provider: {0}")]
    CredentialsNotFound(String),

    /// Failed to access system keyring.
    #[error("keyring error: {0}")]
    Keyring(String),

    /// Provider answered with an error status or an unusable body.
    #[error("provider API error: {0}")]
    ProviderApi(String),

    /// Request could not be sent or its response not read.
    #[error("request failed: {0}")]
    Request(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
