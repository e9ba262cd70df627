//! Rating scale definitions.
//!
//! A [`ScaleDefinition`] names the topics of an interview in traversal order,
//! the example questions and scoring rubric for each topic, and the
//! thresholds used to classify the overall score. It is loaded once per run
//! and shared read-only between sessions.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

/// Errors raised while loading or validating a scale. All of them are fatal
/// configuration errors: no session may start on a partial scale.
#[derive(Debug, Error)]
pub enum ScaleError {
    #[error("failed to read scale file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in scale file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed scale definition: {0}")]
    Malformed(String),

    #[error("scale has no topics")]
    NoTopics,

    #[error("duplicate topic: {0}")]
    DuplicateTopic(String),

    #[error("no rubric for topic: {0}")]
    MissingRubric(String),

    #[error("invalid rubric band '{band}' for topic '{topic}'")]
    InvalidBand { topic: String, band: String },

    #[error("no classification thresholds known for scale '{0}'")]
    NoThresholds(String),
}

pub type Result<T> = std::result::Result<T, ScaleError>;

/// Scoring rubric for a single topic: integer bands `0..=max` with a
/// description of each band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rubric {
    bands: BTreeMap<u32, String>,
}

impl Rubric {
    /// Build a rubric from `(band, description)` pairs.
    pub fn new(bands: impl IntoIterator<Item = (u32, String)>) -> Self {
        Self {
            bands: bands.into_iter().collect(),
        }
    }

    /// Highest valid score for this topic.
    pub fn max(&self) -> u32 {
        self.bands.keys().next_back().copied().unwrap_or(0)
    }

    /// Whether `score` lies in `[0, max]`.
    pub fn accepts(&self, score: i64) -> bool {
        score >= 0 && score <= i64::from(self.max())
    }

    pub fn bands(&self) -> impl Iterator<Item = (u32, &str)> {
        self.bands.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// One `band - description` line per band, lowest first.
    pub fn describe(&self) -> String {
        self.bands
            .iter()
            .map(|(band, text)| format!("{band} - {text}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn from_json(topic: &str, value: &Value) -> Result<Self> {
        let obj = value.as_object().ok_or_else(|| {
            ScaleError::Malformed(format!("rubric for '{topic}' is not an object"))
        })?;
        let mut bands = BTreeMap::new();
        for (band, text) in obj {
            let key: u32 = band.trim().parse().map_err(|_| ScaleError::InvalidBand {
                topic: topic.to_string(),
                band: band.clone(),
            })?;
            let text = match text {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            bands.insert(key, text);
        }
        if bands.is_empty() {
            return Err(ScaleError::MissingRubric(topic.to_string()));
        }
        Ok(Self { bands })
    }
}

/// One dimension of the scale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub name: String,
    /// Example questions shown to the interviewer for inspiration.
    pub examples: Vec<String>,
    pub rubric: Rubric,
}

/// A `(min score, label)` classification pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Threshold {
    pub min: u32,
    pub label: String,
}

impl Threshold {
    pub fn new(min: u32, label: impl Into<String>) -> Self {
        Self {
            min,
            label: label.into(),
        }
    }
}

/// Immutable description of the active rating scale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawScaleDefinition")]
pub struct ScaleDefinition {
    name: String,
    topics: Vec<Topic>,
    /// Sorted by descending `min`.
    thresholds: Vec<Threshold>,
}

/// Unvalidated serialized form; deserializing goes through
/// [`ScaleDefinition::new`].
#[derive(Deserialize)]
struct RawScaleDefinition {
    name: String,
    topics: Vec<Topic>,
    thresholds: Vec<Threshold>,
}

impl TryFrom<RawScaleDefinition> for ScaleDefinition {
    type Error = ScaleError;

    fn try_from(raw: RawScaleDefinition) -> Result<Self> {
        Self::new(raw.name, raw.topics, raw.thresholds)
    }
}

impl ScaleDefinition {
    /// Build and validate a scale. Thresholds may be given in any order.
    pub fn new(
        name: impl Into<String>,
        topics: Vec<Topic>,
        mut thresholds: Vec<Threshold>,
    ) -> Result<Self> {
        let name = name.into();
        if topics.is_empty() {
            return Err(ScaleError::NoTopics);
        }
        for (i, topic) in topics.iter().enumerate() {
            if topics[..i].iter().any(|t| t.name == topic.name) {
                return Err(ScaleError::DuplicateTopic(topic.name.clone()));
            }
        }
        if thresholds.is_empty() {
            return Err(ScaleError::NoThresholds(name));
        }
        thresholds.sort_by(|a, b| b.min.cmp(&a.min));
        Ok(Self {
            name,
            topics,
            thresholds,
        })
    }

    /// Load a scale from a questions file and a rubric file.
    ///
    /// `thresholds` overrides the built-in table for `name`; when it is
    /// `None` the scale must be one of the built-in scales.
    pub fn load(
        name: &str,
        questions_path: &Path,
        rubric_path: &Path,
        thresholds: Option<Vec<Threshold>>,
    ) -> Result<Self> {
        let questions = read_json(questions_path)?;
        let rubrics = read_json(rubric_path)?;
        let scale = Self::from_values(name, &questions, &rubrics, thresholds)?;
        debug!(
            scale = %scale.name,
            topics = scale.topics.len(),
            "loaded scale definition"
        );
        Ok(scale)
    }

    /// Build a scale from already-parsed JSON documents.
    ///
    /// `questions` maps topic → example questions and defines traversal
    /// order. `rubrics` is either `{scale: {topic: bands}}` or `{topic: bands}`.
    pub fn from_values(
        name: &str,
        questions: &Value,
        rubrics: &Value,
        thresholds: Option<Vec<Threshold>>,
    ) -> Result<Self> {
        let questions = questions
            .as_object()
            .ok_or_else(|| ScaleError::Malformed("questions file is not an object".into()))?;
        let rubrics = select_rubrics(name, rubrics)?;

        let mut topics = Vec::with_capacity(questions.len());
        for (topic, examples) in questions {
            let examples = match examples {
                Value::Array(items) => items
                    .iter()
                    .filter_map(|q| q.as_str().map(str::to_string))
                    .collect(),
                Value::String(q) => vec![q.clone()],
                _ => Vec::new(),
            };
            let rubric = rubrics
                .get(topic)
                .ok_or_else(|| ScaleError::MissingRubric(topic.clone()))?;
            topics.push(Topic {
                name: topic.clone(),
                examples,
                rubric: Rubric::from_json(topic, rubric)?,
            });
        }

        let thresholds = thresholds
            .or_else(|| builtin_thresholds(name))
            .ok_or_else(|| ScaleError::NoThresholds(name.to_string()))?;
        Self::new(name, topics, thresholds)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Topics in traversal order.
    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    pub fn topic(&self, name: &str) -> Option<&Topic> {
        self.topics.iter().find(|t| t.name == name)
    }

    pub fn topic_names(&self) -> impl Iterator<Item = &str> {
        self.topics.iter().map(|t| t.name.as_str())
    }

    /// Thresholds in descending order of `min`.
    pub fn thresholds(&self) -> &[Threshold] {
        &self.thresholds
    }

    /// Label of the first threshold whose `min` is at most `score`, or the
    /// lowest label when none matches.
    pub fn classify(&self, score: u32) -> &str {
        self.thresholds
            .iter()
            .find(|t| t.min <= score)
            .or_else(|| self.thresholds.last())
            .map(|t| t.label.as_str())
            .unwrap_or_default()
    }
}

/// Built-in classification tables for the scales the engine ships with.
pub fn builtin_thresholds(scale: &str) -> Option<Vec<Threshold>> {
    let table: &[(u32, &str)] = match scale {
        "HAMA" => &[
            (29, "severe anxiety"),
            (21, "marked anxiety"),
            (14, "definite anxiety"),
            (7, "possible anxiety"),
            (0, "no anxiety"),
        ],
        "HAMD-17" => &[
            (25, "severe depression"),
            (17, "definite depression"),
            (7, "possible depression"),
            (0, "normal"),
        ],
        "PHQ-8" => &[
            (20, "severe depression"),
            (15, "moderately severe depression"),
            (10, "moderate depression"),
            (5, "mild depression"),
            (0, "none or minimal"),
        ],
        _ => return None,
    };
    Some(
        table
            .iter()
            .map(|(min, label)| Threshold::new(*min, *label))
            .collect(),
    )
}

fn read_json(path: &Path) -> Result<Value> {
    let contents = std::fs::read_to_string(path).map_err(|source| ScaleError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| ScaleError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn select_rubrics<'a>(name: &str, rubrics: &'a Value) -> Result<&'a Map<String, Value>> {
    let root = rubrics
        .as_object()
        .ok_or_else(|| ScaleError::Malformed("rubric file is not an object".into()))?;
    match root.get(name) {
        Some(Value::Object(nested)) => Ok(nested),
        _ => Ok(root),
    }
}
