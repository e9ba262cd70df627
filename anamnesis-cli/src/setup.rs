//! Builds the shared pieces every interview needs from configuration.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anamnesis_core::{MemoryResultStore, OracleClient, ScaleDefinition, SessionOrchestrator};
use anamnesis_models::ProviderSettings;
use anamnesis_models::auth::CredentialStore;
use anamnesis_models::registry::ProviderRegistry;
use anamnesis_store::LibsqlResultStore;
use anyhow::{Context, Result};

use crate::config::{AnamnesisConfig, InterviewConfig};

/// Keyring service name for stored API keys.
pub const CREDENTIAL_SERVICE: &str = "anamnesis";

pub fn credentials() -> CredentialStore {
    CredentialStore::new(CREDENTIAL_SERVICE).with_env_fallback()
}

/// Load the configured scale. Missing or malformed files are fatal.
pub fn load_scale(interview: &InterviewConfig) -> Result<Arc<ScaleDefinition>> {
    let questions = interview.questions_path();
    let scale = ScaleDefinition::load(
        &interview.scale,
        &questions,
        &interview.rubric_path,
        interview.thresholds.clone(),
    )
    .with_context(|| {
        format!(
            "loading scale {} from {} and {}",
            interview.scale,
            questions.display(),
            interview.rubric_path.display()
        )
    })?;
    Ok(Arc::new(scale))
}

pub fn oracle_client(
    registry: &ProviderRegistry,
    settings: &ProviderSettings,
    timeout: Duration,
) -> Result<OracleClient> {
    let oracle = registry
        .oracle(settings)
        .with_context(|| format!("configuring {} model {}", settings.kind, settings.model))?;
    Ok(OracleClient::new(Arc::new(oracle)).with_timeout(timeout))
}

/// Everything needed to run sessions.
pub struct Session {
    pub orchestrator: Arc<SessionOrchestrator>,
    pub registry: ProviderRegistry,
}

/// Load the scale, connect the Oracle and open the result database.
/// With `persist = false` no database is opened.
pub async fn session(config: &AnamnesisConfig, persist: bool) -> Result<Session> {
    let scale = load_scale(&config.interview)?;
    let registry = ProviderRegistry::new(credentials());
    let oracle = oracle_client(&registry, &config.oracle.settings(), config.oracle.timeout())?;

    let orchestrator = if persist {
        let store = open_store(&config.batch.results_db, scale.topics().len()).await?;
        SessionOrchestrator::new(scale, oracle, Arc::new(store))
    } else {
        SessionOrchestrator::new(scale, oracle, Arc::new(MemoryResultStore::new()))
            .without_persistence()
    };

    Ok(Session {
        orchestrator: Arc::new(orchestrator.with_max_depth(config.interview.max_depth)),
        registry,
    })
}

pub async fn open_store(path: &Path, item_count: usize) -> Result<LibsqlResultStore> {
    LibsqlResultStore::new_local(path, item_count)
        .await
        .with_context(|| format!("opening {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn missing_scale_files_name_the_paths() {
        let dir = tempfile::tempdir().unwrap();
        let interview = InterviewConfig {
            scale: "HAMA".into(),
            questions_path: None,
            rubric_path: dir.path().join("rubrics.json"),
            max_depth: 3,
            thresholds: None,
        };

        let err = load_scale(&interview).unwrap_err();

        let message = format!("{err:#}");
        assert!(message.contains("HAMA.json"));
        assert!(message.contains("rubrics.json"));
    }

    #[test]
    fn scale_loads_from_configured_files() {
        let dir = tempfile::tempdir().unwrap();
        let questions = dir.path().join("q.json");
        let rubrics = dir.path().join("r.json");
        std::fs::write(&questions, r#"{"Mood": ["How is your mood?"]}"#).unwrap();
        std::fs::write(
            &rubrics,
            r#"{"HAMA": {"Mood": {"0": "none", "1": "mild", "2": "severe"}}}"#,
        )
        .unwrap();
        let interview = InterviewConfig {
            scale: "HAMA".into(),
            questions_path: Some(questions),
            rubric_path: PathBuf::from(&rubrics),
            max_depth: 2,
            thresholds: None,
        };

        let scale = load_scale(&interview).unwrap();

        assert_eq!(scale.name(), "HAMA");
        assert_eq!(scale.topics().len(), 1);
    }
}
