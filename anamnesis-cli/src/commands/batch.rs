//! Simulated interviews over a directory of subject records.

use std::path::PathBuf;
use std::sync::Arc;

use anamnesis_core::batch::load_records;
use anamnesis_core::{
    BatchJob, BatchRunner, BatchSummary, SimulatedResponder, SubjectRecord, SubjectRecordFormat,
};
use anyhow::{Context, Result, bail};
use clap::Args;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::AnamnesisConfig;
use crate::setup;

#[derive(Args, Debug)]
pub struct BatchArgs {
    /// Directory of subject record JSON files
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Maximum concurrent sessions
    #[arg(long)]
    pub concurrency: Option<usize>,
}

pub async fn run(args: BatchArgs, config: AnamnesisConfig) -> Result<()> {
    let data_dir = args.data_dir.unwrap_or_else(|| config.batch.data_dir.clone());
    let concurrency = args.concurrency.unwrap_or(config.batch.max_concurrency);

    let session = setup::session(&config, true).await?;
    let scale_name = session.orchestrator.scale().name().to_string();

    let respondent = if config.respondent.is_separate() {
        setup::oracle_client(
            &session.registry,
            &config.respondent.settings(&config.oracle),
            config.oracle.timeout(),
        )?
    } else {
        session.orchestrator.oracle().clone()
    };

    let (records, failures) = load_records(&data_dir, &SubjectRecordFormat::for_scale(&scale_name))
        .with_context(|| format!("reading subject records from {}", data_dir.display()))?;
    if records.is_empty() {
        bail!("No subject records found in {}", data_dir.display());
    }

    let jobs = jobs(records, |record| {
        Arc::new(SimulatedResponder::new(respondent.clone(), record))
    });
    info!(subjects = jobs.len(), unreadable = failures.len(), "batch prepared");

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received Ctrl+C, finishing running sessions");
            on_signal.cancel();
        }
    });

    let summary = BatchRunner::new(session.orchestrator.clone())
        .with_max_concurrency(concurrency)
        .run(jobs, cancel)
        .await;

    print_summary(&summary, &failures);
    Ok(())
}

/// One job per identified record; duplicates of an identifier are dropped.
fn jobs(
    records: Vec<SubjectRecord>,
    responder: impl Fn(SubjectRecord) -> Arc<SimulatedResponder>,
) -> Vec<BatchJob> {
    let mut seen = std::collections::HashSet::new();
    records
        .into_iter()
        .filter_map(|record| {
            let Some(identifier) = record.identifier.clone() else {
                warn!("subject record without identifier skipped");
                return None;
            };
            if !seen.insert(identifier.clone()) {
                warn!(%identifier, "duplicate subject identifier skipped");
                return None;
            }
            Some(BatchJob {
                identifier,
                responder: responder(record),
            })
        })
        .collect()
}

fn print_summary(summary: &BatchSummary, unreadable: &[(PathBuf, anamnesis_core::SessionError)]) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Outcome").fg(Color::Cyan),
        Cell::new("Count").fg(Color::Cyan),
    ]);
    table.add_row(vec![Cell::new("completed"), Cell::new(summary.completed.len())]);
    table.add_row(vec![Cell::new("skipped"), Cell::new(summary.skipped.len())]);
    table.add_row(vec![Cell::new("cancelled"), Cell::new(summary.cancelled.len())]);
    table.add_row(vec![Cell::new("failed"), Cell::new(summary.failed.len())]);
    table.add_row(vec![Cell::new("unreadable"), Cell::new(unreadable.len())]);
    println!("{table}");

    for (identifier, error) in &summary.failed {
        println!("  {} failed: {}", identifier, error);
    }
    for (path, error) in unreadable {
        println!("  {} unreadable: {}", path.display(), error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anamnesis_core::testing::ScriptedOracle;
    use anamnesis_core::OracleClient;

    fn record(identifier: Option<&str>) -> SubjectRecord {
        SubjectRecord {
            identifier: identifier.map(String::from),
            interview: Vec::new(),
            reference_scores: serde_json::Value::Null,
        }
    }

    #[test]
    fn jobs_drop_unidentified_and_duplicate_records() {
        let client = OracleClient::new(Arc::new(ScriptedOracle::new()));
        let records = vec![record(Some("302")), record(None), record(Some("302")), record(Some("303"))];

        let jobs = jobs(records, |r| Arc::new(SimulatedResponder::new(client.clone(), r)));

        let ids: Vec<_> = jobs.iter().map(|j| j.identifier.as_str()).collect();
        assert_eq!(ids, vec!["302", "303"]);
    }
}
