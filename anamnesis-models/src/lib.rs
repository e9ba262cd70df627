//! Model providers for anamnesis.
//!
//! This crate provides:
//! - A [`ModelProvider`](providers::ModelProvider) trait for chat completions
//! - Ollama and OpenAI-compatible providers
//! - Credential management for API keys
//! - [`ProviderOracle`], the adapter that lets the interview engine talk to a
//!   provider through `anamnesis_core::Oracle`
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  ProviderOracle                      │
//! │          (OracleRequest -> ChatRequest)              │
//! └─────────────────────────────────────────────────────┘
//!                          │
//!                          ▼
//! ┌─────────────────────────────────────────────────────┐
//! │                 ProviderRegistry                     │
//! │        ┌─────────────┐      ┌─────────────┐         │
//! │        │   OpenAI    │      │   Ollama    │         │
//! │        │ compatible  │      │  Provider   │         │
//! │        └─────────────┘      └─────────────┘         │
//! └─────────────────────────────────────────────────────┘
//!                          │
//!                          ▼
//! ┌─────────────────────────────────────────────────────┐
//! │                  CredentialStore                     │
//! │         (System Keyring + Env Fallback)             │
//! └─────────────────────────────────────────────────────┘
//! ```

mod error;
mod oracle;

pub mod auth;
pub mod providers;
pub mod registry;

pub use error::{Error, Result};
pub use oracle::ProviderOracle;
pub use registry::{ProviderKind, ProviderRegistry, ProviderSettings};
