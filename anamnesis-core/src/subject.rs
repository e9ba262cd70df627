//! Interview subjects and their reference records.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SessionError};

/// Self-reported gender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
    Unspecified,
}

impl Gender {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Other => "other",
            Self::Unspecified => "unspecified",
        }
    }

    /// Parse a gender keyword, case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "male" | "man" | "m" => Some(Self::Male),
            "female" | "woman" | "f" => Some(Self::Female),
            "other" => Some(Self::Other),
            "unspecified" | "undisclosed" => Some(Self::Unspecified),
            _ => None,
        }
    }
}

/// Demographic profile collected during intake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub age: Option<u8>,
    pub gender: Gender,
    pub occupation: Option<String>,
}

/// Fields missing from an intake answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MissingFields {
    pub age: bool,
    pub gender: bool,
    pub occupation: bool,
}

impl fmt::Display for MissingFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.age {
            names.push("age");
        }
        if self.gender {
            names.push("gender");
        }
        if self.occupation {
            names.push("occupation");
        }
        write!(f, "{}", names.join(", "))
    }
}

impl Profile {
    /// Profile used when intake could not be parsed.
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            age: None,
            gender: Gender::Unspecified,
            occupation: None,
        }
    }

    /// Parse a free-text intake answer.
    ///
    /// Accepts `age:25, gender:male, occupation:engineer`, `25, male,
    /// engineer`, and `25 male engineer`. All three fields are required.
    pub fn parse(input: &str) -> std::result::Result<Self, MissingFields> {
        let mut parts = split_fields(input, |c| {
            matches!(c, ',' | ';' | '、' | '，' | '；' | '\n' | '\r' | '\t')
        });
        let mut joiner = ", ";
        if parts.len() < 3 {
            parts = split_fields(input, |c| c.is_whitespace() || matches!(c, ',' | ';'));
            joiner = " ";
        }

        let mut age = None;
        let mut gender = None;
        let mut occupation: Option<String> = None;
        // Unkeyed parts that are neither age nor gender.
        let mut rest = Vec::new();

        for part in parts {
            if let Some(value) = keyed(part, "age") {
                age = value.parse::<u8>().ok().filter(|a| (1..=120).contains(a));
                continue;
            }
            if let Some(value) = keyed(part, "gender") {
                gender = Gender::parse(value);
                continue;
            }
            if let Some(value) = keyed(part, "occupation") {
                if !value.is_empty() {
                    occupation = Some(value.to_string());
                }
                continue;
            }
            if age.is_none()
                && let Ok(n) = part.parse::<u8>()
                && (1..=120).contains(&n)
            {
                age = Some(n);
                continue;
            }
            if gender.is_none()
                && let Some(g) = Gender::parse(part)
            {
                gender = Some(g);
                continue;
            }
            rest.push(part);
        }
        if occupation.is_none() && !rest.is_empty() {
            occupation = Some(rest.join(joiner));
        }

        match (age, gender, occupation) {
            (Some(age), Some(gender), Some(occupation)) => Ok(Self {
                age: Some(age),
                gender,
                occupation: Some(occupation),
            }),
            (age, gender, occupation) => Err(MissingFields {
                age: age.is_none(),
                gender: gender.is_none(),
                occupation: occupation.is_none(),
            }),
        }
    }

    /// The identification line shown to every Oracle role.
    #[must_use]
    pub fn identification(&self) -> String {
        let age = self
            .age
            .map(|a| a.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let occupation = self.occupation.as_deref().unwrap_or("unknown");
        format!(
            "Age: {age}, Gender: {}, Occupation: {occupation}",
            self.gender.as_str()
        )
    }
}

fn split_fields(input: &str, sep: impl Fn(char) -> bool) -> Vec<&str> {
    input
        .split(sep)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

/// Value of a `key: value` / `key=value` field, if `part` starts with `key`.
fn keyed<'a>(part: &'a str, key: &str) -> Option<&'a str> {
    let head = part.get(..key.len())?;
    if !head.eq_ignore_ascii_case(key) {
        return None;
    }
    let rest = part[key.len()..].trim_start();
    let rest = rest
        .strip_prefix(':')
        .or_else(|| rest.strip_prefix('：'))
        .or_else(|| rest.strip_prefix('='))?;
    Some(rest.trim())
}

/// A subject being interviewed. The profile is fixed once intake completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub identifier: String,
    pub profile: Profile,
}

impl Subject {
    pub fn new(identifier: impl Into<String>, profile: Profile) -> Self {
        Self {
            identifier: identifier.into(),
            profile,
        }
    }
}

/// One utterance of a reference interview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utterance {
    #[serde(rename = "roleName", alias = "role")]
    pub role: String,
    pub content: String,
}

/// Where a subject record keeps its identifier and reference scores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectRecordFormat {
    pub identifier_field: String,
    pub scores_field: String,
}

impl SubjectRecordFormat {
    /// Field names used by records prepared for `scale`.
    #[must_use]
    pub fn for_scale(scale: &str) -> Self {
        if scale == "PHQ-8" {
            Self {
                identifier_field: "Participant_ID".into(),
                scores_field: "phq8_scores".into(),
            }
        } else {
            Self {
                identifier_field: "video_name".into(),
                scores_field: "scores".into(),
            }
        }
    }
}

/// Reference data for a simulated subject: the real interview transcript
/// and the clinician's score breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectRecord {
    pub identifier: Option<String>,
    pub interview: Vec<Utterance>,
    pub reference_scores: Value,
}

impl SubjectRecord {
    /// Parse a record from JSON using the field names in `format`.
    pub fn from_value(value: &Value, format: &SubjectRecordFormat) -> Result<Self> {
        let identifier = match value.get(&format.identifier_field) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        let interview = match value.get("real_interview") {
            Some(v) => serde_json::from_value(v.clone())?,
            None => Vec::new(),
        };
        let reference_scores = value
            .get(&format.scores_field)
            .cloned()
            .unwrap_or(Value::Null);
        Ok(Self {
            identifier,
            interview,
            reference_scores,
        })
    }

    /// Read a record from a JSON file. The file stem stands in for a missing
    /// identifier.
    pub fn load(path: &Path, format: &SubjectRecordFormat) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| SessionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let value: Value = serde_json::from_str(&contents)?;
        let mut record = Self::from_value(&value, format)?;
        if record.identifier.is_none() {
            record.identifier = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned());
        }
        Ok(record)
    }

    /// The reference interview as `role: content` lines.
    #[must_use]
    pub fn interview_text(&self) -> String {
        self.interview
            .iter()
            .map(|u| format!("{}: {}", u.role, u.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Reference item scores as `item: score` lines. A nested `items` object
    /// is preferred over the top level.
    #[must_use]
    pub fn scores_text(&self) -> String {
        let items = self
            .reference_scores
            .get("items")
            .unwrap_or(&self.reference_scores);
        match items.as_object() {
            Some(map) => map
                .iter()
                .map(|(k, v)| format!("{k}: {v}"))
                .collect::<Vec<_>>()
                .join("\n"),
            None => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_keyed_fields() {
        let profile = Profile::parse("age:25, gender:male, occupation:software engineer").unwrap();
        assert_eq!(profile.age, Some(25));
        assert_eq!(profile.gender, Gender::Male);
        assert_eq!(profile.occupation.as_deref(), Some("software engineer"));
    }

    #[test]
    fn parses_bare_comma_separated_fields() {
        let profile = Profile::parse("41, Female, nurse").unwrap();
        assert_eq!(profile.age, Some(41));
        assert_eq!(profile.gender, Gender::Female);
        assert_eq!(profile.occupation.as_deref(), Some("nurse"));
    }

    #[test]
    fn parses_space_separated_fields() {
        let profile = Profile::parse("33 other nurse").unwrap();
        assert_eq!(profile.age, Some(33));
        assert_eq!(profile.gender, Gender::Other);
    }

    #[test]
    fn multi_word_occupation_is_kept_whole() {
        let profile = Profile::parse("25 male software engineer").unwrap();
        assert_eq!(profile.age, Some(25));
        assert_eq!(profile.gender, Gender::Male);
        assert_eq!(profile.occupation.as_deref(), Some("software engineer"));

        let profile = Profile::parse("retired  school librarian 67 female").unwrap();
        assert_eq!(profile.age, Some(67));
        assert_eq!(profile.occupation.as_deref(), Some("retired school librarian"));
    }

    #[test]
    fn reports_missing_fields() {
        let missing = Profile::parse("gender: male").unwrap_err();
        assert!(missing.age);
        assert!(!missing.gender);
        assert!(missing.occupation);
        assert_eq!(missing.to_string(), "age, occupation");

        let missing = Profile::parse("age:130, female, clerk").unwrap_err();
        assert_eq!(missing, MissingFields { age: true, ..Default::default() });
    }

    #[test]
    fn identification_line_handles_unknowns() {
        assert_eq!(
            Profile::unknown().identification(),
            "Age: unknown, Gender: unspecified, Occupation: unknown"
        );
    }

    #[test]
    fn record_reads_phq8_fields() {
        let value = json!({
            "Participant_ID": "302",
            "real_interview": [
                {"roleName": "Ellie", "content": "how are you doing today"},
                {"roleName": "Participant", "content": "i'm fine"}
            ],
            "phq8_scores": {"PHQ8_Score": 4, "items": {"PHQ8_NoInterest": 1, "PHQ8_Sleep": 3}}
        });
        let record = SubjectRecord::from_value(&value, &SubjectRecordFormat::for_scale("PHQ-8")).unwrap();

        assert_eq!(record.identifier.as_deref(), Some("302"));
        assert_eq!(record.interview.len(), 2);
        assert_eq!(record.interview_text().lines().next(), Some("Ellie: how are you doing today"));
        assert_eq!(record.scores_text(), "PHQ8_NoInterest: 1\nPHQ8_Sleep: 3");
    }

    #[test]
    fn record_accepts_numeric_identifier_and_missing_transcript() {
        let value = json!({"video_name": 17, "scores": {"mood": 2}});
        let record = SubjectRecord::from_value(&value, &SubjectRecordFormat::for_scale("HAMD-17")).unwrap();
        assert_eq!(record.identifier.as_deref(), Some("17"));
        assert!(record.interview.is_empty());
        assert_eq!(record.scores_text(), "mood: 2");
    }

    #[test]
    fn load_falls_back_to_file_stem() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("S001.json");
        std::fs::write(&path, r#"{"real_interview": []}"#).unwrap();

        let record = SubjectRecord::load(&path, &SubjectRecordFormat::for_scale("PHQ-8")).unwrap();
        assert_eq!(record.identifier.as_deref(), Some("S001"));
    }
}
