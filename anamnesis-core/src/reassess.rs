//! Holistic reassessment of completed topics.
//!
//! After each topic completes, a single batched request asks whether the new
//! evidence changes the basis of any earlier topic. Approved answers become
//! [`SummaryPatch`]es; scores are never touched here.

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::oracle::{OracleClient, OracleRequest, OracleRole, json_object};

/// The topic that has just been completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewEvidence {
    pub topic_name: String,
    pub score: u32,
    pub summary: String,
    pub supporting_statements: String,
}

/// An earlier topic under review: score and basis only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PastAssessment {
    pub topic_name: String,
    pub current_score: u32,
    pub current_basis: String,
}

/// The reviewer's decision for one topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub topic: String,
    pub update_required: bool,
    pub new_basis: Option<String>,
}

/// A replacement summary for a completed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryPatch {
    pub topic: String,
    pub summary: String,
}

/// Ask the Oracle to review `past` in light of `evidence` and return the
/// approved summary patches. No past topics means no request.
pub async fn reassess_past_topics(
    oracle: &OracleClient,
    evidence: &NewEvidence,
    past: &[PastAssessment],
) -> Vec<SummaryPatch> {
    if past.is_empty() {
        return Vec::new();
    }
    let request = build_request(evidence, past);
    let verdicts = oracle.ask_parsed(&request, Vec::new(), parse_verdicts).await;
    if let Some(reason) = verdicts.reason() {
        warn!(topic = %evidence.topic_name, %reason, "reassessment skipped");
    }
    let patches = plan_patches(&verdicts.into_value(), past);
    info!(topic = %evidence.topic_name, patches = patches.len(), "reassessment complete");
    patches
}

fn build_request(evidence: &NewEvidence, past: &[PastAssessment]) -> OracleRequest {
    let evidence = serde_json::to_string_pretty(evidence).unwrap_or_default();
    let past = serde_json::to_string_pretty(past).unwrap_or_default();
    OracleRequest::new(
        OracleRole::Reassessor,
        format!("NEW EVIDENCE:\n{evidence}\n\nPAST ASSESSMENTS TO REVIEW:\n{past}"),
    )
    .expect_json()
}

/// Turn reviewer verdicts into patches.
///
/// Verdicts naming a topic outside `past` are skipped, as are verdicts that
/// do not require an update or carry no new basis.
pub fn plan_patches(verdicts: &[Verdict], past: &[PastAssessment]) -> Vec<SummaryPatch> {
    let mut patches: Vec<SummaryPatch> = Vec::new();
    for verdict in verdicts {
        if !past.iter().any(|p| p.topic_name == verdict.topic) {
            warn!(topic = %verdict.topic, "reassessment names a topic that is not under review");
            continue;
        }
        if !verdict.update_required {
            continue;
        }
        let Some(basis) = verdict.new_basis.as_deref().map(str::trim).filter(|b| !b.is_empty())
        else {
            warn!(topic = %verdict.topic, "update required but no new basis given");
            continue;
        };
        // A later verdict for the same topic replaces an earlier one.
        patches.retain(|p| p.topic != verdict.topic);
        patches.push(SummaryPatch {
            topic: verdict.topic.clone(),
            summary: basis.to_string(),
        });
    }
    patches
}

/// Parse `{"results": [{"topic_name", "update_required", "new_basis"}]}`.
pub fn parse_verdicts(text: &str) -> Result<Vec<Verdict>, String> {
    let object = json_object(text)?;
    let results = match object.get("results") {
        Some(Value::Array(results)) => results,
        Some(_) => return Err("'results' is not a list".to_string()),
        None => return Ok(Vec::new()),
    };
    Ok(results.iter().filter_map(verdict_from_value).collect())
}

fn verdict_from_value(value: &Value) -> Option<Verdict> {
    let topic = value.get("topic_name")?.as_str()?.to_string();
    let update_required = match value.get("update_required") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    };
    let new_basis = value
        .get("new_basis")
        .and_then(Value::as_str)
        .map(str::to_string);
    Some(Verdict {
        topic,
        update_required,
        new_basis,
    })
}
