//! Provider construction from settings.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::CredentialStore;
use crate::oracle::ProviderOracle;
use crate::providers::{ModelProvider, OllamaProvider, OpenAiCompatProvider, ollama, openai};
use crate::{Error, Result};

/// Which wire protocol a provider speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI-compatible `/chat/completions`.
    #[serde(alias = "openai-compatible")]
    OpenAi,
    /// Ollama native `/api/chat`.
    Ollama,
}

impl ProviderKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
        }
    }

    #[must_use]
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::OpenAi => openai::DEFAULT_BASE_URL,
            Self::Ollama => ollama::DEFAULT_BASE_URL,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" | "openai-compatible" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(Error::ProviderNotFound(other.to_string())),
        }
    }
}

/// Everything needed to reach one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    /// Overrides the provider's default endpoint.
    pub base_url: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ProviderSettings {
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.kind.default_base_url())
    }
}

/// Builds providers, resolving credentials as needed.
pub struct ProviderRegistry {
    credentials: CredentialStore,
}

impl ProviderRegistry {
    pub fn new(credentials: CredentialStore) -> Self {
        Self { credentials }
    }

    /// Build the provider described by `settings`.
    ///
    /// # Errors
    ///
    /// The hosted OpenAI endpoint requires a key; a missing one is
    /// `Error::CredentialsNotFound`. Other endpoints accept a missing key.
    pub fn provider(&self, settings: &ProviderSettings) -> Result<Arc<dyn ModelProvider>> {
        let base_url = settings.base_url();
        let provider: Arc<dyn ModelProvider> = match settings.kind {
            ProviderKind::Ollama => Arc::new(OllamaProvider::with_base_url(base_url)),
            ProviderKind::OpenAi => {
                let key = if base_url.trim_end_matches('/') == openai::DEFAULT_BASE_URL {
                    Some(self.credentials.get(settings.kind.as_str())?)
                } else {
                    self.credentials.get_optional(settings.kind.as_str())
                };
                Arc::new(OpenAiCompatProvider::new(base_url, key))
            }
        };
        info!(provider = %settings.kind, base_url, model = %settings.model, "model provider ready");
        Ok(provider)
    }

    /// Build an Oracle backed by the provider described by `settings`.
    pub fn oracle(&self, settings: &ProviderSettings) -> Result<ProviderOracle> {
        let provider = self.provider(settings)?;
        Ok(ProviderOracle::new(provider, &settings.model)
            .with_temperature(settings.temperature)
            .with_max_tokens(settings.max_tokens))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(kind: ProviderKind, base_url: Option<&str>) -> ProviderSettings {
        ProviderSettings {
            kind,
            base_url: base_url.map(String::from),
            model: "m".into(),
            temperature: 0.0,
            max_tokens: 512,
        }
    }

    #[test]
    fn kind_parses_case_insensitively() {
        assert_eq!("OpenAI".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert_eq!(" ollama ".parse::<ProviderKind>().unwrap(), ProviderKind::Ollama);
        assert!(matches!(
            "anthropic".parse::<ProviderKind>(),
            Err(Error::ProviderNotFound(name)) if name == "anthropic"
        ));
    }

    #[test]
    fn kind_deserializes_from_config_names() {
        let kind: ProviderKind = serde_json::from_str(r#""openai-compatible""#).unwrap();
        assert_eq!(kind, ProviderKind::OpenAi);
        assert_eq!(ProviderKind::Ollama.to_string(), "ollama");
    }

    #[test]
    fn base_url_defaults_per_kind() {
        assert_eq!(settings(ProviderKind::Ollama, None).base_url(), "http://localhost:11434");
        assert_eq!(
            settings(ProviderKind::OpenAi, Some("http://vllm:8000/v1")).base_url(),
            "http://vllm:8000/v1"
        );
    }

    #[test]
    fn self_hosted_openai_endpoint_needs_no_key() {
        let registry = ProviderRegistry::new(CredentialStore::new("anamnesis-test-nonexistent"));
        let provider = registry
            .provider(&settings(ProviderKind::OpenAi, Some("http://localhost:8000/v1")))
            .unwrap();
        assert_eq!(provider.name(), "openai");
    }

    #[test]
    fn hosted_openai_without_key_is_rejected() {
        let registry = ProviderRegistry::new(CredentialStore::new("anamnesis-test-nonexistent"));
        let err = registry
            .provider(&settings(ProviderKind::OpenAi, None))
            .err()
            .unwrap();
        assert!(matches!(err, Error::CredentialsNotFound(_)));
    }

    #[test]
    fn ollama_oracle_is_built() {
        let registry = ProviderRegistry::new(CredentialStore::new("anamnesis-test-nonexistent"));
        let oracle = registry.oracle(&settings(ProviderKind::Ollama, None)).unwrap();
        assert_eq!(oracle.model(), "m");
    }
}
