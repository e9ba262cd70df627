//! Console logging plus the per-run dialog log.
//!
//! Everything the interviewer and subject say is logged under the `dialog`
//! target. That target is kept off the console and written to its own file.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::filter::{EnvFilter, filter_fn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, fmt};

const DIALOG_TARGET: &str = "dialog";

/// Install the global subscriber. Returns the dialog log path when
/// `dialog_dir` is given.
pub fn init(verbose: bool, dialog_dir: Option<&Path>) -> Result<Option<PathBuf>> {
    let level = if verbose { "debug" } else { "info" };
    let console_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("Failed to create log filter")?
        .add_directive(format!("{DIALOG_TARGET}=off").parse()?);
    let console = fmt::layer().with_target(false).with_filter(console_filter);

    let (dialog, path) = match dialog_dir {
        Some(dir) => {
            let path = dialog_log_path(dir, chrono::Local::now());
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating dialog log directory {}", dir.display()))?;
            let file = File::create(&path)
                .with_context(|| format!("creating dialog log {}", path.display()))?;
            let layer = fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(file))
                .with_filter(filter_fn(|meta| meta.target() == DIALOG_TARGET));
            (Some(layer), Some(path))
        }
        None => (None, None),
    };

    tracing_subscriber::registry().with(console).with(dialog).init();
    Ok(path)
}

fn dialog_log_path(dir: &Path, now: chrono::DateTime<chrono::Local>) -> PathBuf {
    dir.join(format!("dialog_{}.log", now.format("%Y%m%d_%H%M%S")))
}
