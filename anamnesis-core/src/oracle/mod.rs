//! The text-generation capability consumed by the engine.
//!
//! The [`Oracle`] trait is the only seam between the interview engine and a
//! model provider. Everything the engine needs from a model (questions,
//! simulated answers, ratings, scores, summaries) is requested through it
//! with an [`OracleRole`] that selects the system prompt.
//!
//! Callers never see raw replies: [`OracleClient`] applies a timeout, strips
//! reasoning blocks and code fences, and hands the text to a parse-or-default
//! adapter that returns a [`Parsed`] value.

mod client;
mod parse;
pub mod prompts;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use client::{DEFAULT_TIMEOUT, OracleClient};
pub use parse::{FallbackReason, Parsed, clean_response, first_integer, json_object};

/// The role an Oracle request is made under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OracleRole {
    /// Generates interview questions.
    Interviewer,
    /// Rates whether a topic needs more follow-up (0-2).
    NecessityRater,
    /// Scores a topic against its rubric.
    Scorer,
    /// Condenses an answer into key information.
    KeyInfoExtractor,
    /// Reviews past topics against new evidence.
    Reassessor,
    /// Writes the narrative summary and reconciles scores.
    Summarizer,
    /// Formats the final report.
    ReportWriter,
    /// Plays the subject in simulation mode.
    Respondent,
}

impl OracleRole {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Interviewer => "interviewer",
            Self::NecessityRater => "necessity_rater",
            Self::Scorer => "scorer",
            Self::KeyInfoExtractor => "key_info_extractor",
            Self::Reassessor => "reassessor",
            Self::Summarizer => "summarizer",
            Self::ReportWriter => "report_writer",
            Self::Respondent => "respondent",
        }
    }

    /// The fixed system prompt for this role.
    #[must_use]
    pub fn system_prompt(&self) -> &'static str {
        prompts::system_prompt(*self)
    }
}

impl std::fmt::Display for OracleRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single request to the Oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleRequest {
    pub role: OracleRole,
    /// Extra system context appended to the role's system prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    pub prompt: String,
    /// Whether the reply must be a JSON object.
    #[serde(default)]
    pub json: bool,
}

impl OracleRequest {
    pub fn new(role: OracleRole, prompt: impl Into<String>) -> Self {
        Self {
            role,
            context: None,
            prompt: prompt.into(),
            json: false,
        }
    }

    /// Append extra system context.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Ask for a JSON object reply.
    #[must_use]
    pub fn expect_json(mut self) -> Self {
        self.json = true;
        self
    }

    /// The full system prompt: role prompt plus any extra context.
    #[must_use]
    pub fn system(&self) -> String {
        match &self.context {
            Some(ctx) => format!("{}\n\n{}", self.role.system_prompt(), ctx),
            None => self.role.system_prompt().to_string(),
        }
    }
}

/// Failures of an Oracle call. All of them are recoverable: the engine
/// substitutes a documented default and carries on.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OracleError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("cancelled")]
    Cancelled,

    #[error("empty response")]
    EmptyResponse,
}

/// A text-generation service.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Identifier used in logs.
    fn name(&self) -> &str {
        "oracle"
    }

    /// Send one request and return the raw reply text.
    async fn ask(&self, request: &OracleRequest) -> Result<String, OracleError>;
}
