//! Live interview on the terminal.

use anamnesis_core::{SessionError, SessionOutcome, SessionReport};
use anyhow::Result;
use clap::Args;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::AnamnesisConfig;
use crate::responder::ConsoleResponder;
use crate::setup;

#[derive(Args, Debug)]
pub struct InterviewArgs {
    /// Subject identifier (defaults to a timestamp)
    #[arg(long)]
    pub id: Option<String>,

    /// Don't read or write the results database
    #[arg(long)]
    pub no_save: bool,
}

pub async fn run(args: InterviewArgs, config: AnamnesisConfig) -> Result<()> {
    let identifier = args.id.unwrap_or_else(default_identifier);
    let session = setup::session(&config, !args.no_save).await?;
    let responder = ConsoleResponder::stdin();
    let cancel = CancellationToken::new();

    println!(
        "Starting {} interview for '{}'. Press Ctrl+C to abandon.",
        session.orchestrator.scale().name(),
        identifier
    );

    // Dropping the session discards it; nothing is persisted mid-interview.
    let outcome = tokio::select! {
        outcome = session.orchestrator.run(&identifier, &responder, &cancel) => outcome,
        _ = tokio::signal::ctrl_c() => {
            cancel.cancel();
            Err(SessionError::Cancelled)
        }
    };

    match outcome {
        Ok(SessionOutcome::Completed(report)) => {
            print_report(&report);
            if !args.no_save {
                info!(identifier = %report.identifier, db = %config.batch.results_db.display(), "result saved");
            }
            Ok(())
        }
        Ok(SessionOutcome::Skipped { identifier }) => {
            println!("A result for '{}' is already stored. Nothing to do.", identifier);
            Ok(())
        }
        Err(SessionError::Cancelled) => {
            println!("\nInterview abandoned. Nothing was saved.");
            Ok(())
        }
        Err(SessionError::ResponderClosed) => {
            println!("\nInput closed before the interview finished. Nothing was saved.");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn default_identifier() -> String {
    format!("interview-{}", chrono::Local::now().format("%Y%m%d-%H%M%S"))
}

fn print_report(report: &SessionReport) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("#").fg(Color::Cyan),
        Cell::new("Topic").fg(Color::Cyan),
        Cell::new("Initial").fg(Color::Cyan),
        Cell::new("Final").fg(Color::Cyan),
        Cell::new("Summary").fg(Color::Cyan),
    ]);
    for (i, topic) in report.topics.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(&topic.topic),
            Cell::new(topic.initial),
            Cell::new(topic.final_score),
            Cell::new(&topic.summary),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!("Total: {} ({})", report.overall, report.classification);
    println!("Questions asked: {}", report.questions_asked);
    if !report.summary.is_empty() {
        println!();
        println!("{}", report.summary);
    }
    if !report.report.is_empty() {
        println!();
        println!("{}", report.report);
    }
}
