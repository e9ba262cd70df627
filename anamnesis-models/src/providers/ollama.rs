//! Ollama local model provider.
//!
//! Talks to the native `/api/chat` endpoint of a local Ollama instance.
//!
//! # Example
//!
//! ```ignore
//! use anamnesis_models::providers::OllamaProvider;
//!
//! let provider = OllamaProvider::new();  // Uses localhost:11434
//! let provider = OllamaProvider::with_base_url("http://192.168.1.100:11434");
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ChatRequest, ChatResponse, ModelProvider, StopReason, Usage};
use crate::{Error, Result};

/// Default Ollama API base URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

// ────────────────────────────────────────────────────────────────────────────
// Ollama API Types
// ────────────────────────────────────────────────────────────────────────────

/// Message in an Ollama chat request/response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OllamaChatMessage {
    pub role: String,
    pub content: String,
}

/// Request body for Ollama's `/api/chat` endpoint.
#[derive(Debug, Serialize)]
pub struct OllamaChatRequest {
    pub model: String,
    pub messages: Vec<OllamaChatMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<OllamaChatOptions>,
}

/// Chat options for Ollama.
#[derive(Debug, Serialize)]
pub struct OllamaChatOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
}

/// Response from Ollama's `/api/chat` endpoint.
#[derive(Debug, Deserialize)]
pub struct OllamaChatResponse {
    pub model: String,
    pub message: OllamaChatMessage,
    pub done: bool,
    #[serde(default)]
    pub done_reason: Option<String>,
    #[serde(default)]
    pub prompt_eval_count: Option<u64>,
    #[serde(default)]
    pub eval_count: Option<u64>,
}

impl From<OllamaChatResponse> for ChatResponse {
    fn from(response: OllamaChatResponse) -> Self {
        Self {
            content: response.message.content,
            stop_reason: StopReason::from_finish_reason(response.done_reason.as_deref()),
            usage: Usage::new(
                response.prompt_eval_count.unwrap_or(0),
                response.eval_count.unwrap_or(0),
            ),
        }
    }
}

impl From<ChatRequest> for OllamaChatRequest {
    fn from(request: ChatRequest) -> Self {
        let messages = request
            .messages
            .into_iter()
            .map(|m| OllamaChatMessage {
                role: m.role.as_str().to_string(),
                content: m.content,
            })
            .collect();

        let options = if request.temperature.is_some()
            || request.max_tokens.is_some()
            || request.stop.is_some()
        {
            Some(OllamaChatOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
                stop: request.stop,
            })
        } else {
            None
        };

        Self {
            model: request.model,
            messages,
            stream: false,
            format: request.json.then(|| "json".to_string()),
            options,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// OllamaProvider
// ────────────────────────────────────────────────────────────────────────────

/// Ollama local model provider.
pub struct OllamaProvider {
    base_url: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    /// Create a new Ollama provider with default URL (localhost:11434).
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a new Ollama provider with a custom base URL.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Get the base URL for this provider.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/api/chat", self.base_url);
        let ollama_request = OllamaChatRequest::from(request);
        debug!(model = %ollama_request.model, "ollama chat request");

        let response = self
            .client
            .post(&url)
            .json(&ollama_request)
            .send()
            .await
            .map_err(|e| Error::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::ProviderApi(format!(
                "Ollama API returned {}: {}",
                status, body
            )));
        }

        let ollama_response: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Request(e.to_string()))?;

        Ok(ollama_response.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::Message;

    #[test]
    fn new_creates_provider_with_default_url() {
        let provider = OllamaProvider::new();
        assert_eq!(provider.base_url(), "http://localhost:11434");
    }

    #[test]
    fn with_base_url_trims_trailing_slash() {
        let provider = OllamaProvider::with_base_url("http://192.168.1.100:11434/");
        assert_eq!(provider.base_url(), "http://192.168.1.100:11434");
    }

    #[test]
    fn request_carries_options_and_json_format() {
        let request = ChatRequest::new(
            "llama3",
            vec![Message::system("rate it"), Message::user("text")],
        )
        .temperature(0.0)
        .max_tokens(64)
        .json();

        let body = serde_json::to_value(OllamaChatRequest::from(request)).unwrap();

        assert_eq!(body["model"], "llama3");
        assert_eq!(body["stream"], false);
        assert_eq!(body["format"], "json");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["options"]["num_predict"], 64);
    }

    #[test]
    fn plain_request_omits_options() {
        let request = ChatRequest::new("llama3", vec![Message::user("hi")]);
        let body = serde_json::to_value(OllamaChatRequest::from(request)).unwrap();

        assert!(body.get("options").is_none());
        assert!(body.get("format").is_none());
    }

    #[test]
    fn chat_response_converts() {
        let json = r#"{
            "model": "llama3",
            "message": {"role": "assistant", "content": "2"},
            "done": true,
            "done_reason": "stop",
            "prompt_eval_count": 40,
            "eval_count": 1
        }"#;
        let response: OllamaChatResponse = serde_json::from_str(json).unwrap();
        let chat: ChatResponse = response.into();

        assert_eq!(chat.content, "2");
        assert_eq!(chat.stop_reason, StopReason::EndTurn);
        assert_eq!(chat.usage.total_tokens, 41);
    }

    #[test]
    fn truncated_response_reports_max_tokens() {
        let json = r#"{
            "model": "llama3",
            "message": {"role": "assistant", "content": "partial"},
            "done": true,
            "done_reason": "length"
        }"#;
        let response: OllamaChatResponse = serde_json::from_str(json).unwrap();
        let chat: ChatResponse = response.into();

        assert_eq!(chat.stop_reason, StopReason::MaxTokens);
        assert_eq!(chat.usage, Usage::default());
    }

    #[tokio::test]
    #[ignore = "requires a running Ollama instance"]
    async fn chat_against_local_ollama() {
        let provider = OllamaProvider::new();
        let request = ChatRequest::new("llama3", vec![Message::user("Say hi")]);
        let response = provider.chat(request).await.unwrap();
        assert!(!response.content.is_empty());
    }
}
