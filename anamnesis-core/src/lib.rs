//! Interview orchestration engine for anamnesis.
//!
//! This crate runs structured, multi-topic clinical-style interviews:
//!
//! - **Scale** ([`ScaleDefinition`]) lists topics, example questions, rubrics,
//!   and classification thresholds
//! - **Memory** ([`MemoryStore`]) keeps per-topic statements while a topic is
//!   open and its score and summary once completed
//! - **Scheduler** ([`TopicScheduler`]) drives the depth-bounded question loop
//!   of one topic, gated by [`gate::should_continue`]
//! - **Reassessment** ([`reassess`]) revises earlier summaries after each topic
//! - **Aggregation** ([`aggregate`]) reconciles scores and classifies the total
//! - **Orchestrator** ([`SessionOrchestrator`]) composes a whole session and
//!   persists a [`ResultRow`]
//!
//! All text generation goes through the [`Oracle`] trait. Replies reach the
//! engine only as typed [`Parsed`] values, so a failing or confused model
//! degrades a session instead of ending it.

pub mod aggregate;
pub mod batch;
mod error;
pub mod gate;
pub mod memory;
pub mod oracle;
mod orchestrator;
pub mod reassess;
mod responder;
pub mod results;
pub mod scale;
mod scheduler;
mod session;
mod subject;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Errors
pub use error::{Result, SessionError};

// Oracle
pub use oracle::{Oracle, OracleClient, OracleError, OracleRequest, OracleRole, Parsed};

// Engine
pub use memory::{MemoryError, MemoryStore, TopicStatus};
pub use orchestrator::{SessionOrchestrator, SessionOutcome, SessionReport};
pub use scheduler::{DEFAULT_MAX_DEPTH, QuestionKind, TopicOutcome, TopicScheduler};

// Sessions and subjects
pub use responder::{Responder, ResponderPrompt, SimulatedResponder, Stage};
pub use session::{QaPair, SessionId, SessionState, Speaker, Transcript, Turn};
pub use subject::{Gender, MissingFields, Profile, Subject, SubjectRecord, SubjectRecordFormat, Utterance};

// Scale and results
pub use aggregate::{Aggregate, TopicScore};
pub use batch::{BatchJob, BatchRunner, BatchSummary};
pub use results::{MemoryResultStore, ResultRow, ResultStore, StoreError};
pub use scale::{Rubric, ScaleDefinition, ScaleError, Threshold, Topic};
