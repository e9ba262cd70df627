//! Per-subject interview memory.
//!
//! One [`TopicRecord`] per scale topic, kept in scale order and addressed by
//! topic name. A record moves `pending -> open -> completed` exactly once.
//! While open it collects [`Statement`]s (short-term memory); once completed
//! it holds an [`Assessment`] (long-term memory) that only the summary
//! reassessment and the global score reconciliation may touch.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::oracle::{OracleClient, OracleRequest, OracleRole, json_object};
use crate::reassess::{self, NewEvidence, PastAssessment, SummaryPatch};
use crate::scale::ScaleDefinition;

/// Maximum length, in characters, of a statement kept without extraction.
pub const FALLBACK_STATEMENT_CHARS: usize = 20;

/// Contract violations on the memory store. Reaching one is a bug.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MemoryError {
    #[error("cannot {operation} topic '{topic}': it is {status}")]
    InvalidState {
        topic: String,
        operation: &'static str,
        status: TopicStatus,
    },

    #[error("unknown topic: {0}")]
    UnknownTopic(String),
}

pub type Result<T> = std::result::Result<T, MemoryError>;

/// Lifecycle of a topic record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TopicStatus {
    Pending,
    Open,
    Completed,
}

impl TopicStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Open => "open",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for TopicStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key information extracted from one answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Statement {
    pub content: String,
    pub source_turn: u64,
}

/// A score override from the global reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreUpdate {
    pub score: u32,
    pub reason: String,
}

/// The long-term result of a completed topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assessment {
    pub score: u32,
    pub summary: String,
    /// Set when a later topic rewrote the summary.
    pub summary_revised: bool,
    pub update: Option<ScoreUpdate>,
}

impl Assessment {
    /// Reconciled score if present, otherwise the initial score.
    #[must_use]
    pub fn final_score(&self) -> u32 {
        self.update.as_ref().map_or(self.score, |u| u.score)
    }
}

#[derive(Debug, Clone)]
pub struct TopicRecord {
    name: String,
    status: TopicStatus,
    statements: Vec<Statement>,
    assessment: Option<Assessment>,
}

impl TopicRecord {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: TopicStatus::Pending,
            statements: Vec::new(),
            assessment: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> TopicStatus {
        self.status
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn assessment(&self) -> Option<&Assessment> {
        self.assessment.as_ref()
    }

    /// Statements joined for use as supporting evidence.
    pub fn evidence(&self) -> String {
        self.statements
            .iter()
            .map(|s| s.content.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// A completed topic as shown to the Oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LongTermEntry {
    pub topic: String,
    pub score: u32,
    pub summary: String,
    pub updated_score: Option<u32>,
    pub update_reason: Option<String>,
}

/// Read-only view of memory used to build Oracle requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextSnapshot {
    pub long_term_memory: Vec<LongTermEntry>,
    pub short_term_memory: Vec<Statement>,
}

impl ContextSnapshot {
    pub fn is_empty(&self) -> bool {
        self.long_term_memory.is_empty() && self.short_term_memory.is_empty()
    }

    /// Pretty JSON for prompt payloads.
    pub fn to_prompt(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// Topic records of one subject, in scale order.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    identification: String,
    records: Vec<TopicRecord>,
    index: HashMap<String, usize>,
}

impl MemoryStore {
    /// One pending record per topic of `scale`.
    pub fn new(scale: &ScaleDefinition, identification: impl Into<String>) -> Self {
        let records: Vec<TopicRecord> = scale.topic_names().map(TopicRecord::new).collect();
        let index = records
            .iter()
            .enumerate()
            .map(|(i, r)| (r.name.clone(), i))
            .collect();
        Self {
            identification: identification.into(),
            records,
            index,
        }
    }

    pub fn identification(&self) -> &str {
        &self.identification
    }

    pub fn records(&self) -> &[TopicRecord] {
        &self.records
    }

    pub fn get(&self, topic: &str) -> Option<&TopicRecord> {
        self.index.get(topic).map(|&i| &self.records[i])
    }

    fn slot(&mut self, topic: &str) -> Result<&mut TopicRecord> {
        match self.index.get(topic) {
            Some(&i) => Ok(&mut self.records[i]),
            None => Err(MemoryError::UnknownTopic(topic.to_string())),
        }
    }

    fn require(
        &mut self,
        topic: &str,
        operation: &'static str,
        expected: TopicStatus,
    ) -> Result<&mut TopicRecord> {
        let record = self.slot(topic)?;
        if record.status != expected {
            return Err(MemoryError::InvalidState {
                topic: topic.to_string(),
                operation,
                status: record.status,
            });
        }
        Ok(record)
    }

    pub fn open_topic(&mut self, topic: &str) -> Result<()> {
        let record = self.require(topic, "open", TopicStatus::Pending)?;
        record.status = TopicStatus::Open;
        info!(topic, "topic opened");
        Ok(())
    }

    /// Append the key information of `raw` to an open topic.
    ///
    /// Never fails on Oracle trouble: the statement degrades to a short
    /// prefix of `raw`.
    #[instrument(skip(self, oracle, raw), level = "debug")]
    pub async fn add_statement(
        &mut self,
        oracle: &OracleClient,
        topic: &str,
        raw: &str,
        turn: u64,
    ) -> Result<&Statement> {
        self.require(topic, "add a statement to", TopicStatus::Open)?;

        let request = OracleRequest::new(
            OracleRole::KeyInfoExtractor,
            format!("Topic: {topic}\nUser response: \"{raw}\""),
        )
        .expect_json();
        let content = oracle
            .ask_parsed(&request, truncate_statement(raw), parse_key_info)
            .await
            .into_value();
        debug!(topic, turn, %content, "statement recorded");

        let record = self.require(topic, "add a statement to", TopicStatus::Open)?;
        record.statements.push(Statement {
            content,
            source_turn: turn,
        });
        Ok(&record.statements[record.statements.len() - 1])
    }

    /// Close an open topic with its score and summary, then let the new
    /// evidence revise the summaries of earlier topics.
    ///
    /// Returns the topics whose summaries were rewritten.
    #[instrument(skip(self, oracle, summary), level = "debug")]
    pub async fn complete_topic(
        &mut self,
        oracle: &OracleClient,
        topic: &str,
        score: u32,
        summary: String,
    ) -> Result<Vec<String>> {
        let record = self.require(topic, "complete", TopicStatus::Open)?;
        record.status = TopicStatus::Completed;
        record.assessment = Some(Assessment {
            score,
            summary: summary.clone(),
            summary_revised: false,
            update: None,
        });
        let evidence = NewEvidence {
            topic_name: topic.to_string(),
            score,
            summary,
            supporting_statements: record.evidence(),
        };
        info!(topic, score, "topic completed");

        let past = self.past_assessments(topic);
        let patches = reassess::reassess_past_topics(oracle, &evidence, &past).await;
        let mut revised = Vec::with_capacity(patches.len());
        for patch in patches {
            self.apply_summary_patch(&patch)?;
            revised.push(patch.topic);
        }
        Ok(revised)
    }

    /// Record a score override on a completed topic. Later calls replace
    /// earlier ones.
    pub fn revise_topic(&mut self, topic: &str, score: u32, reason: impl Into<String>) -> Result<()> {
        let record = self.require(topic, "revise", TopicStatus::Completed)?;
        let reason = reason.into();
        info!(target: "dialog", topic, score, %reason, "score revised");
        if let Some(assessment) = record.assessment.as_mut() {
            assessment.update = Some(ScoreUpdate { score, reason });
        }
        Ok(())
    }

    /// Replace the summary of a completed topic. The score is left alone.
    pub fn apply_summary_patch(&mut self, patch: &SummaryPatch) -> Result<()> {
        let record = self.require(&patch.topic, "revise the summary of", TopicStatus::Completed)?;
        if let Some(assessment) = record.assessment.as_mut() {
            assessment.summary = patch.summary.clone();
            assessment.summary_revised = true;
        }
        info!(topic = %patch.topic, summary = %patch.summary, "summary revised");
        Ok(())
    }

    /// Completed topics other than `exclude`, with score and summary only.
    pub fn past_assessments(&self, exclude: &str) -> Vec<PastAssessment> {
        self.completed()
            .filter(|(record, _)| record.name != exclude)
            .map(|(record, assessment)| PastAssessment {
                topic_name: record.name.clone(),
                current_score: assessment.score,
                current_basis: assessment.summary.clone(),
            })
            .collect()
    }

    /// All completed topics, plus the statements of `current` if it is open.
    pub fn context_snapshot(&self, current: &str) -> ContextSnapshot {
        let long_term_memory = self
            .completed()
            .map(|(record, a)| LongTermEntry {
                topic: record.name.clone(),
                score: a.score,
                summary: a.summary.clone(),
                updated_score: a.update.as_ref().map(|u| u.score),
                update_reason: a.update.as_ref().map(|u| u.reason.clone()),
            })
            .collect();
        let short_term_memory = match self.get(current) {
            Some(record) if record.status == TopicStatus::Open => record.statements.clone(),
            _ => Vec::new(),
        };
        ContextSnapshot {
            long_term_memory,
            short_term_memory,
        }
    }

    /// Final score of a completed topic.
    pub fn final_score(&self, topic: &str) -> Option<u32> {
        self.get(topic)?.assessment.as_ref().map(Assessment::final_score)
    }

    pub fn all_completed(&self) -> bool {
        self.records.iter().all(|r| r.status == TopicStatus::Completed)
    }

    fn completed(&self) -> impl Iterator<Item = (&TopicRecord, &Assessment)> {
        self.records
            .iter()
            .filter_map(|r| r.assessment.as_ref().map(|a| (r, a)))
    }
}

/// The first few characters of an answer, used when extraction fails.
pub fn truncate_statement(raw: &str) -> String {
    raw.trim().chars().take(FALLBACK_STATEMENT_CHARS).collect()
}

const KEY_INFO_CATEGORIES: [&str; 5] = ["Emotion", "Frequency", "Symptom", "Duration", "Impact"];

/// `Category: a, b; Category: c`, or `Summary: ...` when no entity was found.
fn parse_key_info(text: &str) -> std::result::Result<String, String> {
    let object = json_object(text)?;
    let entities = object.get("entities").and_then(Value::as_object);

    let mut parts = Vec::new();
    if let Some(entities) = entities {
        for category in KEY_INFO_CATEGORIES {
            let values: Vec<&str> = entities
                .get(category)
                .and_then(Value::as_array)
                .map(|vs| vs.iter().filter_map(Value::as_str).filter(|v| !v.is_empty()).collect())
                .unwrap_or_default();
            if !values.is_empty() {
                parts.push(format!("{category}: {}", values.join(", ")));
            }
        }
    }
    if !parts.is_empty() {
        return Ok(parts.join("; "));
    }

    match object.get("summary").and_then(Value::as_str).map(str::trim) {
        Some(summary) if !summary.is_empty() => Ok(format!("Summary: {summary}")),
        _ => {
            warn!("key info reply has neither entities nor summary");
            Err("no entities or summary".to_string())
        }
    }
}
