//! OpenAI-compatible chat completions provider.
//!
//! Works with the OpenAI API and anything that speaks the same
//! `/chat/completions` dialect (vLLM, LM Studio, DeepSeek, ...).

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ChatRequest, ChatResponse, ModelProvider, StopReason, Usage};
use crate::auth::ApiKey;
use crate::{Error, Result};

/// Default OpenAI API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<CompletionMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CompletionMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    usage: Option<CompletionUsage>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

impl From<ChatRequest> for CompletionRequest {
    fn from(request: ChatRequest) -> Self {
        Self {
            model: request.model,
            messages: request
                .messages
                .into_iter()
                .map(|m| CompletionMessage {
                    role: m.role.as_str().to_string(),
                    content: Some(m.content),
                })
                .collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stop: request.stop,
            response_format: request.json.then_some(ResponseFormat {
                kind: "json_object",
            }),
        }
    }
}

impl TryFrom<CompletionResponse> for ChatResponse {
    type Error = Error;

    fn try_from(response: CompletionResponse) -> Result<Self> {
        let usage = response
            .usage
            .map(|u| Usage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::ProviderApi("no choices in completion response".into()))?;
        Ok(Self {
            content: choice.message.content.unwrap_or_default(),
            stop_reason: StopReason::from_finish_reason(choice.finish_reason.as_deref()),
            usage,
        })
    }
}

/// Provider for OpenAI-compatible `/chat/completions` endpoints.
pub struct OpenAiCompatProvider {
    base_url: String,
    api_key: Option<ApiKey>,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a provider for `base_url`. `api_key` may be omitted for local
    /// servers that do not check it.
    pub fn new(base_url: impl Into<String>, api_key: Option<ApiKey>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ModelProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = CompletionRequest::from(request);
        debug!(model = %body.model, "chat completion request");

        let mut builder = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }
        let response = builder
            .send()
            .await
            .map_err(|e| Error::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    Error::ProviderApi(format!("authentication failed ({}): {}", status, body))
                }
                _ => Error::ProviderApi(format!("chat completion returned {}: {}", status, body)),
            });
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::Request(e.to_string()))?;
        completion.try_into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::Message;

    #[test]
    fn base_url_is_normalized() {
        let provider = OpenAiCompatProvider::new("http://localhost:8000/v1/", None);
        assert_eq!(provider.base_url(), "http://localhost:8000/v1");
    }

    #[test]
    fn json_requests_ask_for_json_object() {
        let request = ChatRequest::new("gpt-4o-mini", vec![Message::user("score it")])
            .temperature(0.0)
            .json();

        let body = serde_json::to_value(CompletionRequest::from(request)).unwrap();

        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "score it");
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn completion_response_converts() {
        let json = r#"{
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "{\"score\": 2}"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 120, "completion_tokens": 8, "total_tokens": 128}
        }"#;
        let response: CompletionResponse = serde_json::from_str(json).unwrap();
        let chat = ChatResponse::try_from(response).unwrap();

        assert_eq!(chat.content, r#"{"score": 2}"#);
        assert_eq!(chat.stop_reason, StopReason::EndTurn);
        assert_eq!(chat.usage.total_tokens, 128);
    }

    #[test]
    fn empty_choices_is_a_provider_error() {
        let response: CompletionResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        let err = ChatResponse::try_from(response).unwrap_err();
        assert!(matches!(err, Error::ProviderApi(_)));
    }

    #[test]
    fn null_content_becomes_empty_text() {
        let json = r#"{"choices": [{"message": {"role": "assistant", "content": null}, "finish_reason": "content_filter"}]}"#;
        let response: CompletionResponse = serde_json::from_str(json).unwrap();
        let chat = ChatResponse::try_from(response).unwrap();

        assert_eq!(chat.content, "");
        assert_eq!(chat.stop_reason, StopReason::ContentFilter);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_request_error() {
        let provider = OpenAiCompatProvider::new("http://127.0.0.1:9", None);
        let request = ChatRequest::new("m", vec![Message::user("hi")]);
        let err = provider.chat(request).await.unwrap_err();
        assert!(matches!(err, Error::Request(_)));
    }
}
