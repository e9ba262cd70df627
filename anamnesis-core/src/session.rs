//! Per-subject session state.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::memory::MemoryStore;
use crate::scale::ScaleDefinition;
use crate::subject::Subject;

/// Unique identifier for a session run (UUIDv7, time-ordered).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who produced a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    System,
    Interviewer,
    Subject,
}

impl Speaker {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Interviewer => "interviewer",
            Self::Subject => "subject",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
}

/// Ordered conversation log of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn push(&mut self, speaker: Speaker, text: impl Into<String>) {
        self.turns.push(Turn {
            speaker,
            text: text.into(),
        });
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// `speaker: text` lines.
    pub fn render(&self) -> String {
        self.turns
            .iter()
            .map(|t| format!("{}: {}", t.speaker.as_str(), t.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// One question and its answer within a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    pub answer: String,
}

/// Render Q/A history as `Q: ..`/`A: ..` lines.
pub fn render_history(history: &[QaPair]) -> String {
    history
        .iter()
        .map(|qa| format!("Q: {}\nA: {}", qa.question, qa.answer))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Everything a running session owns. Dropped once the report is produced.
#[derive(Debug)]
pub struct SessionState {
    pub id: SessionId,
    pub subject: Subject,
    pub scale: Arc<ScaleDefinition>,
    pub memory: MemoryStore,
    pub transcript: Transcript,
    pub last_question: String,
    pub last_response: String,
    turn: u64,
}

impl SessionState {
    pub fn new(subject: Subject, scale: Arc<ScaleDefinition>) -> Self {
        let identification = subject.profile.identification();
        let memory = MemoryStore::new(&scale, identification.clone());
        let mut transcript = Transcript::default();
        transcript.push(Speaker::System, identification);
        Self {
            id: SessionId::new(),
            subject,
            scale,
            memory,
            transcript,
            last_question: String::new(),
            last_response: String::new(),
            turn: 0,
        }
    }

    /// Advance the turn counter and return the new turn id.
    pub fn next_turn(&mut self) -> u64 {
        self.turn += 1;
        self.turn
    }

    /// Number of answered questions so far.
    pub fn questions_asked(&self) -> u64 {
        self.turn
    }

    /// Record a question and its answer as the most recent exchange.
    pub fn record_exchange(&mut self, question: &str, answer: &str) {
        self.transcript.push(Speaker::Interviewer, question);
        self.transcript.push(Speaker::Subject, answer);
        self.last_question = question.to_string();
        self.last_response = answer.to_string();
    }
}
