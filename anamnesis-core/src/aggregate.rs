//! End-of-session score reconciliation, aggregation, and classification.

use std::fmt::Write as _;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::memory::{self, MemoryStore, ScoreUpdate};
use crate::oracle::{OracleClient, OracleRequest, OracleRole, Parsed, json_object};
use crate::scale::ScaleDefinition;
use crate::session::SessionState;

/// Topic name used for the closing context snapshot.
pub const OVERALL_SUMMARY: &str = "Overall Summary";

/// A reconciliation entry before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ProposedUpdate {
    pub topic: String,
    pub score: Value,
    pub reason: String,
}

/// The summarizer's reply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    pub summary: String,
    pub proposed: Vec<ProposedUpdate>,
}

/// Parse `{"summary": "...", "updated_scores": {topic: {score, reason}}}`.
///
/// Entries that are not objects are dropped here; score validation happens
/// in [`validate_updates`].
pub fn parse_reconciliation(text: &str) -> Result<Reconciliation, String> {
    let object = json_object(text)?;
    let summary = object
        .get("summary")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string();
    let mut proposed = Vec::new();
    if let Some(Value::Object(updates)) = object.get("updated_scores") {
        for (topic, entry) in updates {
            let Some(entry) = entry.as_object() else {
                warn!(%topic, "reconciliation entry is not an object, dropped");
                continue;
            };
            proposed.push(ProposedUpdate {
                topic: topic.clone(),
                score: entry.get("score").cloned().unwrap_or(Value::Null),
                reason: entry
                    .get("reason")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            });
        }
    }
    Ok(Reconciliation { summary, proposed })
}

/// Keep the entries that name a scale topic and carry an integer score
/// within that topic's rubric.
pub fn validate_updates(
    proposed: &[ProposedUpdate],
    scale: &ScaleDefinition,
) -> Vec<(String, ScoreUpdate)> {
    let mut valid = Vec::new();
    for entry in proposed {
        let Some(topic) = scale.topic(&entry.topic) else {
            warn!(topic = %entry.topic, "reconciliation names an unknown topic, dropped");
            continue;
        };
        match entry.score.as_i64() {
            Some(score) if topic.rubric.accepts(score) => valid.push((
                entry.topic.clone(),
                ScoreUpdate {
                    score: u32::try_from(score).unwrap_or(0),
                    reason: entry.reason.clone(),
                },
            )),
            _ => warn!(
                topic = %entry.topic,
                score = %entry.score,
                max = topic.rubric.max(),
                "invalid reconciled score, dropped"
            ),
        }
    }
    valid
}

/// Ask for the closing summary and score reconciliation, then apply the
/// valid updates. Returns the narrative summary.
#[instrument(skip_all, fields(identifier = %state.subject.identifier))]
pub async fn reconcile(oracle: &OracleClient, state: &mut SessionState) -> memory::Result<String> {
    let scores = state
        .memory
        .records()
        .iter()
        .filter_map(|r| Some(format!("{}:{}", r.name(), state.memory.final_score(r.name())?)))
        .collect::<Vec<_>>()
        .join(", ");
    let request = OracleRequest::new(
        OracleRole::Summarizer,
        format!(
            "Full History:\n{}\n\nInitial Scores:\n{}\n\nMemory:\n{}",
            state.transcript.render(),
            scores,
            state.memory.context_snapshot(OVERALL_SUMMARY).to_prompt()
        ),
    )
    .expect_json();

    let reply = oracle
        .ask_parsed(&request, Reconciliation::default(), parse_reconciliation)
        .await;
    let Reconciliation { summary, proposed } = reply.into_value();

    let updates = validate_updates(&proposed, &state.scale);
    if updates.is_empty() {
        info!(target: "dialog", "no scores adjusted");
    }
    for (topic, update) in updates {
        state.memory.revise_topic(&topic, update.score, update.reason)?;
    }
    Ok(summary)
}

/// Initial and final score of one topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicScore {
    pub topic: String,
    pub initial: u32,
    pub final_score: u32,
    pub summary: String,
    pub update_reason: Option<String>,
}

/// Aggregated result of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Aggregate {
    /// In scale order. Topics that never completed count as 0.
    pub topics: Vec<TopicScore>,
    pub overall: u32,
    pub classification: String,
}

impl Aggregate {
    /// Final scores in scale order.
    pub fn items(&self) -> Vec<u32> {
        self.topics.iter().map(|t| t.final_score).collect()
    }

    /// Markdown table: index, topic, initial score, final score, plus total
    /// and classification rows.
    pub fn score_table(&self) -> String {
        let mut table = String::from("| # | Topic | Score | Final score |\n|---|---|---|---|\n");
        for (i, t) in self.topics.iter().enumerate() {
            let _ = writeln!(table, "| {} | {} | {} | {} |", i + 1, t.topic, t.initial, t.final_score);
        }
        let _ = writeln!(table, "|  | Total | {} |  |", self.overall);
        let _ = write!(table, "|  | Classification | {} |  |", self.classification);
        table
    }
}

/// Sum final scores and classify the total.
pub fn aggregate(memory: &MemoryStore, scale: &ScaleDefinition) -> Aggregate {
    let topics: Vec<TopicScore> = scale
        .topic_names()
        .map(|name| {
            let assessment = memory.get(name).and_then(|r| r.assessment());
            TopicScore {
                topic: name.to_string(),
                initial: assessment.map_or(0, |a| a.score),
                final_score: assessment.map_or(0, memory::Assessment::final_score),
                summary: assessment.map(|a| a.summary.clone()).unwrap_or_default(),
                update_reason: assessment.and_then(|a| a.update.as_ref().map(|u| u.reason.clone())),
            }
        })
        .collect();
    let overall = topics.iter().map(|t| t.final_score).sum();
    let classification = scale.classify(overall).to_string();
    Aggregate {
        topics,
        overall,
        classification,
    }
}

/// Ask the report writer to format the report, falling back to the local
/// table and summary.
pub async fn write_report(
    oracle: &OracleClient,
    scale: &ScaleDefinition,
    aggregate: &Aggregate,
    summary: &str,
) -> Parsed<String> {
    let table = aggregate.score_table();
    let local = render_report(scale.name(), &table, summary);
    let request = OracleRequest::new(
        OracleRole::ReportWriter,
        format!("Scale: {}\n\n### Score table\n{table}\n\n### Summary\n{summary}", scale.name()),
    );
    oracle.ask_text(&request, &local).await
}

fn render_report(scale: &str, table: &str, summary: &str) -> String {
    let summary = if summary.is_empty() {
        "No summary available."
    } else {
        summary
    };
    format!("# {scale} Assessment Report\n\n{table}\n\n## Summary\n\n{summary}\n")
}
