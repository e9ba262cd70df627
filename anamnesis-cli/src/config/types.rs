use std::path::PathBuf;
use std::time::Duration;

use anamnesis_core::Threshold;
use anamnesis_models::{ProviderKind, ProviderSettings};
use serde::{Deserialize, Serialize};

/// Configuration as stored in TOML files (with optional fields for merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawAnamnesisConfig {
    #[serde(default)]
    pub oracle: RawOracleConfig,

    #[serde(default)]
    pub respondent: RespondentConfig,

    #[serde(default)]
    pub interview: RawInterviewConfig,

    #[serde(default)]
    pub batch: RawBatchConfig,

    #[serde(default)]
    pub logging: RawLoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawOracleConfig {
    pub provider: Option<ProviderKind>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawInterviewConfig {
    pub scale: Option<String>,
    pub questions_path: Option<PathBuf>,
    pub rubric_path: Option<PathBuf>,
    pub max_depth: Option<u32>,
    pub thresholds: Option<Vec<Threshold>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawBatchConfig {
    pub data_dir: Option<PathBuf>,
    pub results_db: Option<PathBuf>,
    pub max_concurrency: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawLoggingConfig {
    pub dialog_log_dir: Option<PathBuf>,
}

/// Final configuration with defaults applied
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AnamnesisConfig {
    #[serde(default)]
    pub oracle: OracleConfig,

    #[serde(default)]
    pub respondent: RespondentConfig,

    #[serde(default)]
    pub interview: InterviewConfig,

    #[serde(default)]
    pub batch: BatchConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// The model that interviews, rates, scores, and reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    pub provider: ProviderKind,

    /// Endpoint override; the provider default when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,

    /// Per-call timeout
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::OpenAi,
            base_url: Some(DEFAULT_BASE_URL.to_string()),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.0,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl OracleConfig {
    pub fn settings(&self) -> ProviderSettings {
        ProviderSettings {
            kind: self.provider,
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// Optional separate model for the simulated respondent.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RespondentConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderKind>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl RespondentConfig {
    /// Respondent settings, falling back to the oracle's for unset fields.
    pub fn settings(&self, oracle: &OracleConfig) -> ProviderSettings {
        let mut settings = oracle.settings();
        if let Some(provider) = self.provider {
            settings.kind = provider;
            // A different provider does not share the oracle's endpoint.
            if provider != oracle.provider {
                settings.base_url = None;
            }
        }
        if let Some(base_url) = &self.base_url {
            settings.base_url = Some(base_url.clone());
        }
        if let Some(model) = &self.model {
            settings.model = model.clone();
        }
        settings
    }

    pub fn is_separate(&self) -> bool {
        self.provider.is_some() || self.base_url.is_some() || self.model.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewConfig {
    /// Scale name, e.g. HAMA, HAMD-17, PHQ-8
    pub scale: String,

    /// Topic → example questions; `<scale>.json` when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub questions_path: Option<PathBuf>,

    /// Rubrics per scale and topic
    pub rubric_path: PathBuf,

    /// Maximum questions per topic
    pub max_depth: u32,

    /// Overrides the built-in classification table
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thresholds: Option<Vec<Threshold>>,
}

impl Default for InterviewConfig {
    fn default() -> Self {
        Self {
            scale: DEFAULT_SCALE.to_string(),
            questions_path: None,
            rubric_path: PathBuf::from(DEFAULT_RUBRIC_PATH),
            max_depth: anamnesis_core::DEFAULT_MAX_DEPTH,
            thresholds: None,
        }
    }
}

impl InterviewConfig {
    pub fn questions_path(&self) -> PathBuf {
        self.questions_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{}.json", self.scale)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    pub data_dir: PathBuf,
    pub results_db: PathBuf,
    pub max_concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            results_db: PathBuf::from("results.db"),
            max_concurrency: anamnesis_core::batch::DEFAULT_MAX_CONCURRENCY,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory for per-run dialog logs
    pub dialog_log_dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dialog_log_dir: PathBuf::from("dialog_logs"),
        }
    }
}

/// Default OpenAI-compatible endpoint (a local inference server)
pub const DEFAULT_BASE_URL: &str = "http://localhost:10010/v1";

pub const DEFAULT_MODEL: &str = "qwen2.5-72b";

pub const DEFAULT_MAX_TOKENS: u32 = 2048;

pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

pub const DEFAULT_SCALE: &str = "PHQ-8";

pub const DEFAULT_RUBRIC_PATH: &str = "scoring_standards.json";
