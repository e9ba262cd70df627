//! End-to-end interview of one subject.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::aggregate::{self, TopicScore};
use crate::error::{Result, SessionError};
use crate::oracle::OracleClient;
use crate::oracle::prompts::{self, FALLBACK_REPORT};
use crate::responder::{Responder, ResponderPrompt, Stage};
use crate::results::{ResultRow, ResultStore};
use crate::scale::ScaleDefinition;
use crate::scheduler::{DEFAULT_MAX_DEPTH, TopicScheduler};
use crate::session::{SessionId, SessionState, Transcript};
use crate::subject::{Profile, Subject};

/// Final payload of a completed session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub session_id: SessionId,
    pub identifier: String,
    pub scale: String,
    pub profile: Profile,
    pub topics: Vec<TopicScore>,
    pub overall: u32,
    pub classification: String,
    pub summary: String,
    pub report: String,
    pub questions_asked: u64,
    pub transcript: Transcript,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SessionReport {
    pub fn result_row(&self) -> ResultRow {
        ResultRow {
            identifier: self.identifier.clone(),
            total: self.overall,
            classification: self.classification.clone(),
            items: self.topics.iter().map(|t| t.final_score).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum SessionOutcome {
    Completed(Box<SessionReport>),
    /// A result already existed for the identifier; nothing was run.
    Skipped { identifier: String },
}

/// Composes intake, the per-topic loop, reconciliation, reporting, and
/// persistence into one session.
pub struct SessionOrchestrator {
    scale: Arc<ScaleDefinition>,
    oracle: OracleClient,
    store: Arc<dyn ResultStore>,
    max_depth: u32,
    persist: bool,
}

impl SessionOrchestrator {
    pub fn new(scale: Arc<ScaleDefinition>, oracle: OracleClient, store: Arc<dyn ResultStore>) -> Self {
        Self {
            scale,
            oracle,
            store,
            max_depth: DEFAULT_MAX_DEPTH,
            persist: true,
        }
    }

    #[must_use]
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Run sessions without reading or writing the result store.
    #[must_use]
    pub fn without_persistence(mut self) -> Self {
        self.persist = false;
        self
    }

    pub fn scale(&self) -> &ScaleDefinition {
        &self.scale
    }

    pub fn oracle(&self) -> &OracleClient {
        &self.oracle
    }

    /// Interview `identifier` through `responder`.
    ///
    /// Skips without any Oracle call when a result already exists. A
    /// cancelled session is discarded and nothing is persisted.
    #[instrument(skip(self, responder, cancel))]
    pub async fn run(
        &self,
        identifier: &str,
        responder: &dyn Responder,
        cancel: &CancellationToken,
    ) -> Result<SessionOutcome> {
        if self.persist && self.store.exists(identifier).await? {
            info!("result already stored, skipping");
            return Ok(SessionOutcome::Skipped {
                identifier: identifier.to_string(),
            });
        }
        let started_at = Utc::now();

        let (profile, greeting, intake_answer) = self.intake(responder, cancel).await?;
        let mut state = SessionState::new(Subject::new(identifier, profile), self.scale.clone());
        state.last_question = greeting;
        state.last_response = intake_answer;
        info!(session = %state.id, identification = %state.memory.identification(), "session started");

        let scheduler = TopicScheduler::new(&self.oracle, responder).with_max_depth(self.max_depth);
        let total = self.scale.topics().len();
        for (i, topic) in self.scale.topics().iter().enumerate() {
            info!(topic = %topic.name, "topic {}/{}", i + 1, total);
            scheduler.run(&mut state, topic, cancel).await?;
        }

        if cancel.is_cancelled() {
            return Err(SessionError::Cancelled);
        }
        let summary = aggregate::reconcile(&self.oracle, &mut state).await?;
        let result = aggregate::aggregate(&state.memory, &self.scale);
        info!(overall = result.overall, classification = %result.classification, "session scored");

        let report = aggregate::write_report(&self.oracle, &self.scale, &result, &summary).await;
        let mut report = report.into_value();
        if report.trim().is_empty() {
            report = FALLBACK_REPORT.to_string();
        }
        info!(target: "dialog", "{report}");
        info!(target: "dialog", questions = state.questions_asked(), "interview finished");

        if cancel.is_cancelled() {
            return Err(SessionError::Cancelled);
        }
        let report = SessionReport {
            session_id: state.id,
            identifier: identifier.to_string(),
            scale: self.scale.name().to_string(),
            profile: state.subject.profile.clone(),
            topics: result.topics,
            overall: result.overall,
            classification: result.classification,
            summary,
            report,
            questions_asked: state.questions_asked(),
            transcript: state.transcript,
            started_at,
            finished_at: Utc::now(),
        };
        if self.persist {
            self.store.upsert(&report.result_row()).await?;
            info!("result stored");
        }
        Ok(SessionOutcome::Completed(Box::new(report)))
    }

    /// Greet the subject and collect the demographic profile. Returns the
    /// profile, the greeting, and the last intake answer.
    async fn intake(
        &self,
        responder: &dyn Responder,
        cancel: &CancellationToken,
    ) -> Result<(Profile, String, String)> {
        let greeting = prompts::greeting(self.scale.name());
        let mut question = greeting.clone();
        let mut answer = String::new();
        for attempt in 1..=responder.intake_attempts().max(1) {
            if cancel.is_cancelled() {
                return Err(SessionError::Cancelled);
            }
            info!(target: "dialog", "Interviewer: {question}");
            answer = responder
                .respond(&ResponderPrompt {
                    question: &question,
                    stage: Stage::Intake { attempt },
                })
                .await?;
            info!(target: "dialog", "Subject: {answer}");
            match Profile::parse(&answer) {
                Ok(profile) => return Ok((profile, greeting, answer)),
                Err(missing) => {
                    warn!(attempt, %missing, "could not parse intake answer");
                    question = prompts::intake_hint(&missing.to_string());
                }
            }
        }
        warn!("continuing with an unspecified profile");
        Ok((Profile::unknown(), greeting, answer))
    }
}
