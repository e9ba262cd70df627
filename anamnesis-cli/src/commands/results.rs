//! Stored result rows.

use anamnesis_core::{ResultRow, ResultStore};
use anyhow::{Result, bail};
use clap::Args;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};

use crate::config::AnamnesisConfig;
use crate::setup;

#[derive(Args, Debug)]
pub struct ResultsArgs {
    /// Show a single subject
    #[arg(long)]
    pub id: Option<String>,
}

pub async fn run(args: ResultsArgs, config: AnamnesisConfig) -> Result<()> {
    let db = &config.batch.results_db;
    if !db.exists() {
        println!("No results database at {}.", db.display());
        println!();
        println!("Run an interview or a batch first.");
        return Ok(());
    }

    // Item columns are named after the configured scale's topics.
    let scale = setup::load_scale(&config.interview)?;
    let topics: Vec<&str> = scale.topic_names().collect();
    let store = setup::open_store(db, topics.len()).await?;

    let rows = match &args.id {
        Some(id) => match store.get(id).await? {
            Some(row) => vec![row],
            None => bail!("No result stored for '{}'", id),
        },
        None => store.list().await?,
    };

    if rows.is_empty() {
        println!("No results stored.");
        return Ok(());
    }

    println!("{}", results_table(&rows, &topics));
    Ok(())
}

fn results_table(rows: &[ResultRow], topics: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    let mut header = vec![
        Cell::new("Identifier").fg(Color::Cyan),
        Cell::new("Total").fg(Color::Cyan),
        Cell::new("Classification").fg(Color::Cyan),
    ];
    header.extend(topics.iter().map(|t| Cell::new(t).fg(Color::Cyan)));
    table.set_header(header);

    for row in rows {
        let mut cells = vec![
            Cell::new(&row.identifier),
            Cell::new(row.total),
            Cell::new(&row.classification),
        ];
        cells.extend(row.items_padded(topics.len()).into_iter().map(Cell::new));
        table.add_row(cells);
    }
    table
}
