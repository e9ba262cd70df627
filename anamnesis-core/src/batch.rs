//! Bounded-concurrency sessions over many subjects.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::{Result, SessionError};
use crate::orchestrator::{SessionOrchestrator, SessionOutcome};
use crate::responder::Responder;
use crate::subject::{SubjectRecord, SubjectRecordFormat};

/// Default number of concurrent sessions.
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// `*.json` files in `dir`, sorted by name.
pub fn discover_records(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|source| SessionError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();
    Ok(paths)
}

/// Load every record in `dir`. Unreadable files are reported, not fatal.
pub fn load_records(
    dir: &Path,
    format: &SubjectRecordFormat,
) -> Result<(Vec<SubjectRecord>, Vec<(PathBuf, SessionError)>)> {
    let mut records = Vec::new();
    let mut failures = Vec::new();
    for path in discover_records(dir)? {
        match SubjectRecord::load(&path, format) {
            Ok(record) => records.push(record),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping unreadable subject record");
                failures.push((path, err));
            }
        }
    }
    Ok((records, failures))
}

/// One subject to interview.
pub struct BatchJob {
    pub identifier: String,
    pub responder: Arc<dyn Responder>,
}

/// What happened to each subject of a batch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub completed: Vec<String>,
    pub skipped: Vec<String>,
    pub cancelled: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.completed.len() + self.skipped.len() + self.cancelled.len() + self.failed.len()
    }
}

enum JobResult {
    Completed,
    Skipped,
    Cancelled,
    Failed(String),
}

/// Runs one session per job on a bounded worker pool.
pub struct BatchRunner {
    orchestrator: Arc<SessionOrchestrator>,
    max_concurrency: usize,
}

impl BatchRunner {
    pub fn new(orchestrator: Arc<SessionOrchestrator>) -> Self {
        Self {
            orchestrator,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    #[must_use]
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Run all jobs. Once `cancel` fires, jobs waiting for a worker are not
    /// started and running sessions stop at their next step.
    pub async fn run(&self, jobs: Vec<BatchJob>, cancel: CancellationToken) -> BatchSummary {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();
        info!(jobs = jobs.len(), workers = self.max_concurrency, "batch started");

        for job in jobs {
            let semaphore = semaphore.clone();
            let orchestrator = self.orchestrator.clone();
            let cancel = cancel.clone();
            tasks.spawn(async move {
                let permit = tokio::select! {
                    _ = cancel.cancelled() => None,
                    permit = semaphore.acquire_owned() => permit.ok(),
                };
                let Some(_permit) = permit else {
                    return (job.identifier, JobResult::Cancelled);
                };
                let outcome = orchestrator
                    .run(&job.identifier, job.responder.as_ref(), &cancel)
                    .await;
                let result = match outcome {
                    Ok(SessionOutcome::Completed(report)) => {
                        info!(identifier = %job.identifier, overall = report.overall, "subject completed");
                        JobResult::Completed
                    }
                    Ok(SessionOutcome::Skipped { .. }) => JobResult::Skipped,
                    Err(SessionError::Cancelled) => JobResult::Cancelled,
                    Err(err) => {
                        error!(identifier = %job.identifier, error = %err, "subject failed");
                        JobResult::Failed(err.to_string())
                    }
                };
                (job.identifier, result)
            });
        }

        let mut summary = BatchSummary::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((id, JobResult::Completed)) => summary.completed.push(id),
                Ok((id, JobResult::Skipped)) => summary.skipped.push(id),
                Ok((id, JobResult::Cancelled)) => summary.cancelled.push(id),
                Ok((id, JobResult::Failed(err))) => summary.failed.push((id, err)),
                Err(err) => error!(error = %err, "batch worker panicked"),
            }
        }
        summary.completed.sort();
        summary.skipped.sort();
        summary.cancelled.sort();
        summary.failed.sort();
        info!(
            completed = summary.completed.len(),
            skipped = summary.skipped.len(),
            cancelled = summary.cancelled.len(),
            failed = summary.failed.len(),
            "batch finished"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovers_sorted_json_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.json", "a.json", "notes.txt"] {
            std::fs::write(dir.path().join(name), "{}").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.json")).unwrap();

        let paths = discover_records(dir.path()).unwrap();
        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.json", "b.json"]);
    }

    #[test]
    fn unreadable_records_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("302.json"), r#"{"Participant_ID": "302"}"#).unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();

        let (records, failures) =
            load_records(dir.path(), &SubjectRecordFormat::for_scale("PHQ-8")).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].identifier.as_deref(), Some("302"));
        assert_eq!(failures.len(), 1);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let err = discover_records(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, SessionError::Io { .. }));
    }
}
