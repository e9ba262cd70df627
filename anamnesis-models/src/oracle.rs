//! [`Oracle`] implementation over a chat provider.

use std::sync::Arc;

use anamnesis_core::{Oracle, OracleError, OracleRequest};
use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use crate::Error;
use crate::providers::{ChatRequest, Message, ModelProvider, StopReason};

/// Sends each Oracle request as a two-message chat: the role's system prompt
/// and the request payload.
pub struct ProviderOracle {
    provider: Arc<dyn ModelProvider>,
    model: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl ProviderOracle {
    pub fn new(provider: Arc<dyn ModelProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: None,
            max_tokens: None,
        }
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn chat_request(&self, request: &OracleRequest) -> ChatRequest {
        let mut chat = ChatRequest::new(
            &self.model,
            vec![Message::system(request.system()), Message::user(&request.prompt)],
        );
        chat.temperature = self.temperature;
        chat.max_tokens = self.max_tokens;
        if request.json {
            chat = chat.json();
        }
        chat
    }
}

impl From<Error> for OracleError {
    fn from(err: Error) -> Self {
        match err {
            Error::Request(msg) => OracleError::Transport(msg),
            Error::Io(e) => OracleError::Transport(e.to_string()),
            other => OracleError::Provider(other.to_string()),
        }
    }
}

#[async_trait]
impl Oracle for ProviderOracle {
    fn name(&self) -> &str {
        self.provider.name()
    }

    #[instrument(skip(self, request), fields(role = %request.role, model = %self.model), level = "debug")]
    async fn ask(&self, request: &OracleRequest) -> Result<String, OracleError> {
        let response = self.provider.chat(self.chat_request(request)).await?;
        if response.stop_reason == StopReason::MaxTokens {
            warn!(role = %request.role, "reply truncated at max_tokens");
        }
        debug!(tokens = response.usage.total_tokens, "oracle reply");
        Ok(response.content)
    }
}
