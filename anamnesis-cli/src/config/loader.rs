use super::types::{
    AnamnesisConfig, BatchConfig, InterviewConfig, LoggingConfig, OracleConfig, RawAnamnesisConfig,
    RawBatchConfig, RawInterviewConfig, RawLoggingConfig, RawOracleConfig, RespondentConfig,
};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load merged configuration: user, project, environment overrides,
    /// then `explicit`
    pub fn load(explicit: Option<&Path>) -> Result<AnamnesisConfig> {
        let mut raw = RawAnamnesisConfig::default();

        // Layer 1: User config
        if let Some(user_path) = Self::user_config_path()
            && user_path.exists()
        {
            raw = Self::merge_raw(raw, Self::read_raw(&user_path)?);
        }

        // Layer 2: Project config
        let project_path = Self::project_config_path();
        if project_path.exists() {
            raw = Self::merge_raw(raw, Self::read_raw(&project_path)?);
        }

        // Layer 3: API_BASE_URL / API_MODEL
        raw = Self::merge_raw(raw, Self::env_overrides(|var| std::env::var(var).ok()));

        // Layer 4: --config
        if let Some(path) = explicit {
            raw = Self::merge_raw(raw, Self::read_raw(path)?);
        }

        Ok(Self::finalize(raw))
    }

    /// Get user config path (platform-specific)
    pub fn user_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "anamnesis").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get project config path
    /// Can be overridden with ANAMNESIS_PROJECT_CONFIG_DIR env var (useful for isolated tests)
    pub fn project_config_path() -> PathBuf {
        if let Ok(dir) = std::env::var("ANAMNESIS_PROJECT_CONFIG_DIR") {
            PathBuf::from(dir).join("config.toml")
        } else {
            PathBuf::from(".anamnesis/config.toml")
        }
    }

    fn read_raw(path: &Path) -> Result<RawAnamnesisConfig> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("parsing config {}", path.display()))
    }

    fn env_overrides(lookup: impl Fn(&str) -> Option<String>) -> RawAnamnesisConfig {
        let non_empty = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        RawAnamnesisConfig {
            oracle: RawOracleConfig {
                base_url: non_empty("API_BASE_URL"),
                model: non_empty("API_MODEL"),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Merge two raw configs (overlay values override base only if explicitly set)
    fn merge_raw(base: RawAnamnesisConfig, overlay: RawAnamnesisConfig) -> RawAnamnesisConfig {
        RawAnamnesisConfig {
            oracle: RawOracleConfig {
                provider: overlay.oracle.provider.or(base.oracle.provider),
                base_url: overlay.oracle.base_url.or(base.oracle.base_url),
                model: overlay.oracle.model.or(base.oracle.model),
                temperature: overlay.oracle.temperature.or(base.oracle.temperature),
                max_tokens: overlay.oracle.max_tokens.or(base.oracle.max_tokens),
                timeout_secs: overlay.oracle.timeout_secs.or(base.oracle.timeout_secs),
            },
            respondent: RespondentConfig {
                provider: overlay.respondent.provider.or(base.respondent.provider),
                base_url: overlay.respondent.base_url.or(base.respondent.base_url),
                model: overlay.respondent.model.or(base.respondent.model),
            },
            interview: RawInterviewConfig {
                scale: overlay.interview.scale.or(base.interview.scale),
                questions_path: overlay
                    .interview
                    .questions_path
                    .or(base.interview.questions_path),
                rubric_path: overlay.interview.rubric_path.or(base.interview.rubric_path),
                max_depth: overlay.interview.max_depth.or(base.interview.max_depth),
                thresholds: overlay.interview.thresholds.or(base.interview.thresholds),
            },
            batch: RawBatchConfig {
                data_dir: overlay.batch.data_dir.or(base.batch.data_dir),
                results_db: overlay.batch.results_db.or(base.batch.results_db),
                max_concurrency: overlay.batch.max_concurrency.or(base.batch.max_concurrency),
            },
            logging: RawLoggingConfig {
                dialog_log_dir: overlay.logging.dialog_log_dir.or(base.logging.dialog_log_dir),
            },
        }
    }

    /// Convert raw config to final config with defaults applied
    fn finalize(raw: RawAnamnesisConfig) -> AnamnesisConfig {
        let oracle_defaults = OracleConfig::default();
        let interview_defaults = InterviewConfig::default();
        let batch_defaults = BatchConfig::default();

        // An explicit provider without a base URL uses that provider's endpoint.
        let base_url = match (raw.oracle.base_url, raw.oracle.provider) {
            (Some(url), _) => Some(url),
            (None, Some(_)) => None,
            (None, None) => oracle_defaults.base_url,
        };

        AnamnesisConfig {
            oracle: OracleConfig {
                provider: raw.oracle.provider.unwrap_or(oracle_defaults.provider),
                base_url,
                model: raw.oracle.model.unwrap_or(oracle_defaults.model),
                temperature: raw.oracle.temperature.unwrap_or(oracle_defaults.temperature),
                max_tokens: raw.oracle.max_tokens.unwrap_or(oracle_defaults.max_tokens),
                timeout_secs: raw.oracle.timeout_secs.unwrap_or(oracle_defaults.timeout_secs),
            },
            respondent: raw.respondent,
            interview: InterviewConfig {
                scale: raw.interview.scale.unwrap_or(interview_defaults.scale),
                questions_path: raw.interview.questions_path,
                rubric_path: raw
                    .interview
                    .rubric_path
                    .unwrap_or(interview_defaults.rubric_path),
                max_depth: raw.interview.max_depth.unwrap_or(interview_defaults.max_depth),
                thresholds: raw.interview.thresholds,
            },
            batch: BatchConfig {
                data_dir: raw.batch.data_dir.unwrap_or(batch_defaults.data_dir),
                results_db: raw.batch.results_db.unwrap_or(batch_defaults.results_db),
                max_concurrency: raw
                    .batch
                    .max_concurrency
                    .unwrap_or(batch_defaults.max_concurrency)
                    .max(1),
            },
            logging: LoggingConfig {
                dialog_log_dir: raw
                    .logging
                    .dialog_log_dir
                    .unwrap_or_else(|| LoggingConfig::default().dialog_log_dir),
            },
        }
    }

    /// Load a single config file with defaults applied (for testing)
    #[cfg(test)]
    pub fn load_from_path(path: &Path) -> Result<AnamnesisConfig> {
        Ok(Self::finalize(Self::read_raw(path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anamnesis_models::ProviderKind;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    fn raw(contents: &str) -> RawAnamnesisConfig {
        toml::from_str(contents).unwrap()
    }

    // ==================== Merge Tests ====================

    #[test]
    fn test_merge_overlay_wins_only_when_set() {
        let base = raw(
            r#"
[oracle]
model = "base-model"
timeout_secs = 30

[batch]
max_concurrency = 8
"#,
        );
        let overlay = raw(
            r#"
[oracle]
model = "overlay-model"
"#,
        );

        let merged = ConfigLoader::merge_raw(base, overlay);

        assert_eq!(merged.oracle.model.as_deref(), Some("overlay-model"));
        assert_eq!(merged.oracle.timeout_secs, Some(30));
        assert_eq!(merged.batch.max_concurrency, Some(8));
    }

    #[test]
    fn test_merge_thresholds_replace_whole_list() {
        let base = raw(
            r#"
[interview]
thresholds = [{ min = 0, label = "a" }, { min = 5, label = "b" }]
"#,
        );
        let overlay = raw(
            r#"
[interview]
thresholds = [{ min = 0, label = "low" }]
"#,
        );

        let merged = ConfigLoader::merge_raw(base, overlay);

        let thresholds = merged.interview.thresholds.unwrap();
        assert_eq!(thresholds.len(), 1);
        assert_eq!(thresholds[0].label, "low");
    }

    // ==================== Finalize Tests ====================

    #[test]
    fn test_finalize_empty_uses_defaults() {
        let config = ConfigLoader::finalize(RawAnamnesisConfig::default());
        assert_eq!(config.oracle.provider, ProviderKind::OpenAi);
        assert_eq!(config.oracle.base_url.as_deref(), Some("http://localhost:10010/v1"));
        assert_eq!(config.batch.results_db, PathBuf::from("results.db"));
    }

    #[test]
    fn test_finalize_provider_without_url_uses_provider_endpoint() {
        let config = ConfigLoader::finalize(raw(
            r#"
[oracle]
provider = "ollama"
"#,
        ));
        assert_eq!(config.oracle.provider, ProviderKind::Ollama);
        assert!(config.oracle.base_url.is_none());
        assert_eq!(config.oracle.settings().base_url(), "http://localhost:11434");
    }

    #[test]
    fn test_finalize_clamps_concurrency() {
        let config = ConfigLoader::finalize(raw(
            r#"
[batch]
max_concurrency = 0
"#,
        ));
        assert_eq!(config.batch.max_concurrency, 1);
    }

    #[test]
    fn test_env_overrides_ignore_blank_values() {
        let overrides = ConfigLoader::env_overrides(|var| match var {
            "API_MODEL" => Some("deepseek-r1-32b".to_string()),
            "API_BASE_URL" => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(overrides.oracle.model.as_deref(), Some("deepseek-r1-32b"));
        assert!(overrides.oracle.base_url.is_none());
    }

    // ==================== File Tests ====================

    #[test]
    fn test_load_from_path_reads_all_sections() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            "config.toml",
            r#"
[oracle]
provider = "openai"
base_url = "https://api.openai.com/v1"
model = "gpt-4o"
temperature = 0.2

[respondent]
provider = "ollama"
model = "llama3"

[interview]
scale = "HAMA"
rubric_path = "rubrics.json"
max_depth = 2

[batch]
data_dir = "subjects"

[logging]
dialog_log_dir = "logs"
"#,
        );

        let config = ConfigLoader::load_from_path(&path).unwrap();

        assert_eq!(config.oracle.model, "gpt-4o");
        assert_eq!(config.oracle.temperature, 0.2);
        assert_eq!(config.respondent.provider, Some(ProviderKind::Ollama));
        assert_eq!(config.interview.scale, "HAMA");
        assert_eq!(config.interview.questions_path(), PathBuf::from("HAMA.json"));
        assert_eq!(config.interview.max_depth, 2);
        assert_eq!(config.batch.data_dir, PathBuf::from("subjects"));
        assert_eq!(config.batch.max_concurrency, 4);
        assert_eq!(config.logging.dialog_log_dir, PathBuf::from("logs"));
    }

    #[test]
    fn test_load_from_path_rejects_unknown_provider() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "config.toml", "[oracle]\nprovider = \"anthropic\"\n");
        assert!(ConfigLoader::load_from_path(&path).is_err());
    }

    #[test]
    #[serial]
    fn test_project_config_path_env_override() {
        let dir = TempDir::new().unwrap();
        // SAFETY: serialized with the other tests touching this variable
        unsafe { std::env::set_var("ANAMNESIS_PROJECT_CONFIG_DIR", dir.path()) };
        let path = ConfigLoader::project_config_path();
        // SAFETY: as above
        unsafe { std::env::remove_var("ANAMNESIS_PROJECT_CONFIG_DIR") };

        assert_eq!(path, dir.path().join("config.toml"));
    }

    #[test]
    #[serial]
    fn test_explicit_config_layers_over_project_config() {
        let dir = TempDir::new().unwrap();
        write_config(
            &dir,
            "config.toml",
            "[oracle]\nmodel = \"project-model\"\ntimeout_secs = 10\n",
        );
        let explicit = write_config(&dir, "explicit.toml", "[oracle]\nmodel = \"explicit-model\"\n");
        // SAFETY: serialized with the other tests touching this variable
        unsafe { std::env::set_var("ANAMNESIS_PROJECT_CONFIG_DIR", dir.path()) };
        let config = ConfigLoader::load(Some(&explicit));
        // SAFETY: as above
        unsafe { std::env::remove_var("ANAMNESIS_PROJECT_CONFIG_DIR") };

        let config = config.unwrap();
        assert_eq!(config.oracle.model, "explicit-model");
        assert_eq!(config.oracle.timeout_secs, 10);
    }

    #[test]
    #[serial]
    fn test_missing_explicit_config_is_an_error() {
        let dir = TempDir::new().unwrap();
        // SAFETY: serialized with the other tests touching this variable
        unsafe { std::env::set_var("ANAMNESIS_PROJECT_CONFIG_DIR", dir.path()) };
        let result = ConfigLoader::load(Some(&dir.path().join("missing.toml")));
        // SAFETY: as above
        unsafe { std::env::remove_var("ANAMNESIS_PROJECT_CONFIG_DIR") };

        assert!(result.is_err());
    }
}
