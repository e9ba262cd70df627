//! Model provider trait and implementations.
//!
//! The [`ModelProvider`] trait is the one interface the rest of anamnesis
//! sees, whether the model runs behind a hosted OpenAI-compatible endpoint or
//! on a local Ollama instance.
//!
//! # Example
//!
//! ```ignore
//! use anamnesis_models::providers::{ChatRequest, Message, ModelProvider};
//!
//! async fn chat(provider: &dyn ModelProvider) {
//!     let request = ChatRequest::new("qwen2.5:7b", vec![Message::user("Hello!")]);
//!     let response = provider.chat(request).await?;
//!     println!("Response: {}", response.content);
//! }
//! ```

pub mod ollama;
pub mod openai;
mod types;

use async_trait::async_trait;

pub use ollama::OllamaProvider;
pub use openai::OpenAiCompatProvider;
pub use types::*;

use crate::Result;

/// Trait for chat model providers.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Returns the provider name (e.g., "openai", "ollama").
    fn name(&self) -> &str;

    /// Perform a non-streaming chat completion request.
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse>;
}
