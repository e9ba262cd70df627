use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

mod commands;
mod config;
mod logging;
mod responder;
mod setup;

use config::ConfigLoader;

#[derive(Parser)]
#[command(name = "anamnesis", about = "Structured clinical interviews driven by a language model")]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Extra config file, applied over user and project config
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage model API keys
    Auth(commands::auth::AuthArgs),
    /// Simulate interviews for every subject record in a directory
    Batch(commands::batch::BatchArgs),
    /// Manage configuration
    Config(commands::config::ConfigArgs),
    /// Interview a subject on the terminal
    Interview(commands::interview::InterviewArgs),
    /// Show stored results
    Results(commands::results::ResultsArgs),
}

impl Commands {
    fn runs_sessions(&self) -> bool {
        matches!(self, Commands::Batch(_) | Commands::Interview(_))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ConfigLoader::load(cli.config.as_deref())?;

    let dialog_dir = cli
        .command
        .runs_sessions()
        .then_some(config.logging.dialog_log_dir.as_path());
    if let Some(path) = logging::init(cli.verbose, dialog_dir)? {
        info!(path = %path.display(), "dialog log");
    }

    match cli.command {
        Commands::Auth(args) => commands::auth::run(args),
        Commands::Batch(args) => commands::batch::run(args, config).await,
        Commands::Config(args) => commands::config::run(args, &config),
        Commands::Interview(args) => commands::interview::run(args, config).await,
        Commands::Results(args) => commands::results::run(args, config).await,
    }
}
