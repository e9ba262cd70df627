//! The depth-bounded question loop for one topic.

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, SessionError};
use crate::gate::{parse_necessity, should_continue};
use crate::oracle::prompts::FALLBACK_QUESTION;
use crate::oracle::{OracleClient, OracleRequest, OracleRole, Parsed, json_object};
use crate::responder::{Responder, ResponderPrompt, Stage};
use crate::scale::{Rubric, Topic};
use crate::session::{QaPair, SessionState, render_history};

/// Questions asked per topic before scoring, at most.
pub const DEFAULT_MAX_DEPTH: u32 = 3;

/// Whether a question opens the topic or digs deeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionKind {
    Initial,
    Followup,
}

impl QuestionKind {
    #[must_use]
    pub fn for_depth(depth: u32) -> Self {
        if depth == 0 { Self::Initial } else { Self::Followup }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Followup => "followup",
        }
    }
}

/// How a topic ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicOutcome {
    pub topic: String,
    /// Questions asked for this topic (never above the maximum depth).
    pub depth: u32,
    pub score: u32,
    pub summary: String,
    /// Set when the score is a substituted default.
    pub score_fallback: bool,
    /// Earlier topics whose summaries this topic rewrote.
    pub revised: Vec<String>,
}

/// Runs the question/answer loop of a single topic and scores it.
pub struct TopicScheduler<'a> {
    oracle: &'a OracleClient,
    responder: &'a dyn Responder,
    max_depth: u32,
}

impl<'a> TopicScheduler<'a> {
    pub fn new(oracle: &'a OracleClient, responder: &'a dyn Responder) -> Self {
        Self {
            oracle,
            responder,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    #[must_use]
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    /// Ask, record, rate, repeat; then score and complete the topic.
    ///
    /// Cancellation is honoured between steps. A cancelled topic is left
    /// open and never completed.
    #[instrument(skip_all, fields(topic = %topic.name))]
    pub async fn run(
        &self,
        state: &mut SessionState,
        topic: &Topic,
        cancel: &CancellationToken,
    ) -> Result<TopicOutcome> {
        state.memory.open_topic(&topic.name)?;
        info!(target: "dialog", "---- topic: {}", topic.name);

        let mut depth = 0;
        let mut asked = 0;
        let mut history: Vec<QaPair> = Vec::new();

        while depth < self.max_depth {
            ensure_running(cancel)?;

            let kind = QuestionKind::for_depth(depth);
            let request = self.question_request(state, topic, kind);
            let question = self
                .oracle
                .ask_text(&request, FALLBACK_QUESTION)
                .await
                .into_value();
            info!(target: "dialog", "Interviewer: {question}");

            let answer = self
                .responder
                .respond(&ResponderPrompt {
                    question: &question,
                    stage: Stage::Topic {
                        topic,
                        depth,
                        history: &history,
                    },
                })
                .await?;
            info!(target: "dialog", "Subject: {answer}");

            let turn = state.next_turn();
            state
                .memory
                .add_statement(self.oracle, &topic.name, &answer, turn)
                .await?;
            state.record_exchange(&question, &answer);
            history.push(QaPair { question, answer });

            ensure_running(cancel)?;
            let rating = self.rate_necessity(topic, &history).await;

            asked += 1;
            depth += 1;
            debug!(depth, rating, "question answered");
            if !should_continue(rating, asked) {
                break;
            }
        }

        ensure_running(cancel)?;
        let scored = self.score(topic, &history).await;
        let score_fallback = scored.is_fallback();
        let (score, summary) = scored.into_value();
        info!(target: "dialog", score, %summary, "topic '{}' scored", topic.name);

        let revised = state
            .memory
            .complete_topic(self.oracle, &topic.name, score, summary.clone())
            .await?;

        Ok(TopicOutcome {
            topic: topic.name.clone(),
            depth,
            score,
            summary,
            score_fallback,
            revised,
        })
    }

    fn question_request(
        &self,
        state: &SessionState,
        topic: &Topic,
        kind: QuestionKind,
    ) -> OracleRequest {
        let other_topics = state
            .scale
            .topic_names()
            .filter(|name| *name != topic.name)
            .collect::<Vec<_>>()
            .join(", ");
        let examples = topic
            .examples
            .iter()
            .map(|q| format!("- {q}"))
            .collect::<Vec<_>>()
            .join("\n");
        let memory = state.memory.context_snapshot(&topic.name).to_prompt();
        let mut payload = format!(
            "Type: {}\nTopic: {}\nIdentification: {}\nLast Question: {}\nLast Response: {}\nMemory: {}\n",
            kind.as_str(),
            topic.name,
            state.memory.identification(),
            state.last_question,
            state.last_response,
            memory,
        );
        if kind == QuestionKind::Followup {
            payload.push_str(&format!("Other Topics: {other_topics}\n"));
        }
        payload.push_str(&format!("Examples:\n{examples}"));
        OracleRequest::new(OracleRole::Interviewer, payload)
    }

    async fn rate_necessity(&self, topic: &Topic, history: &[QaPair]) -> u64 {
        let request = OracleRequest::new(
            OracleRole::NecessityRater,
            format!("Topic: {}\nHistory:\n{}", topic.name, render_history(history)),
        );
        self.oracle
            .ask_parsed(&request, 0, parse_necessity)
            .await
            .into_value()
    }

    async fn score(&self, topic: &Topic, history: &[QaPair]) -> Parsed<(u32, String)> {
        let request = OracleRequest::new(
            OracleRole::Scorer,
            format!(
                "Topic: {}\nHistory:\n{}\nStandard:\n{}",
                topic.name,
                render_history(history),
                topic.rubric.describe()
            ),
        )
        .expect_json();
        let parsed = self
            .oracle
            .ask_parsed(&request, ScoreReply::default(), parse_score_reply)
            .await;
        validate_score(parsed, &topic.rubric)
    }
}

fn ensure_running(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(SessionError::Cancelled);
    }
    Ok(())
}

/// A scorer reply before range validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScoreReply {
    /// `None` when the score was missing or not an integer.
    pub score: Option<i64>,
    pub summary: String,
}

/// Parse `{"score": <int>, "summary": "<text>"}`.
///
/// A missing or non-integer score still parses, so the summary survives.
pub fn parse_score_reply(text: &str) -> std::result::Result<ScoreReply, String> {
    let object = json_object(text)?;
    let score = match object.get("score") {
        Some(Value::Number(n)) => n.as_i64(),
        _ => None,
    };
    let summary = object
        .get("summary")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string();
    Ok(ScoreReply { score, summary })
}

/// Clamp a scorer reply to the rubric: scores outside `[0, max]` become 0
/// and keep their summary.
pub fn validate_score(reply: Parsed<ScoreReply>, rubric: &Rubric) -> Parsed<(u32, String)> {
    match reply {
        Parsed::Value(ScoreReply { score, summary }) => match score {
            Some(s) if rubric.accepts(s) => Parsed::Value((u32::try_from(s).unwrap_or(0), summary)),
            other => {
                warn!(score = ?other, max = rubric.max(), "score outside rubric range, using 0");
                let detail = match other {
                    Some(s) => format!("{s} not in [0, {}]", rubric.max()),
                    None => "score is not an integer".to_string(),
                };
                Parsed::out_of_range((0, summary), detail)
            }
        },
        Parsed::Fallback { value, reason } => Parsed::Fallback {
            value: (0, value.summary),
            reason,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{FallbackReason, OracleError};
    use crate::scale::{ScaleDefinition, Threshold};
    use crate::subject::{Profile, Subject};
    use crate::testing::ScriptedOracle;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Answers every question with the same text and counts calls.
    struct EchoResponder {
        asked: Mutex<Vec<u32>>,
    }

    impl EchoResponder {
        fn new() -> Self {
            Self {
                asked: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Responder for EchoResponder {
        async fn respond(&self, prompt: &ResponderPrompt<'_>) -> Result<String> {
            if let Stage::Topic { depth, .. } = prompt.stage {
                self.asked.lock().unwrap().push(depth);
            }
            Ok("Most days I feel low".into())
        }
    }

    fn rubric() -> Rubric {
        Rubric::new((0..=4).map(|b| (b, format!("band {b}"))))
    }

    fn state() -> SessionState {
        let topics = ["mood", "sleep"]
            .iter()
            .map(|n| Topic {
                name: n.to_string(),
                examples: vec![format!("Tell me about your {n}.")],
                rubric: rubric(),
            })
            .collect();
        let scale = ScaleDefinition::new("TEST", topics, vec![Threshold::new(0, "none")]).unwrap();
        SessionState::new(Subject::new("S001", Profile::unknown()), Arc::new(scale))
    }

    fn oracle() -> Arc<ScriptedOracle> {
        let oracle = Arc::new(ScriptedOracle::new());
        oracle.always(OracleRole::Interviewer, "How has your mood been?");
        oracle.always(OracleRole::KeyInfoExtractor, r#"{"entities": {"Emotion": ["low"]}}"#);
        oracle
    }

    #[tokio::test]
    async fn high_necessity_runs_to_max_depth() {
        let oracle = oracle();
        oracle.always(OracleRole::NecessityRater, "2");
        oracle.push(OracleRole::Scorer, r#"{"score": 3, "summary": "persistent low mood"}"#);
        let client = OracleClient::new(oracle.clone());
        let responder = EchoResponder::new();
        let mut state = state();
        let topic = state.scale.topics()[0].clone();

        let outcome = TopicScheduler::new(&client, &responder)
            .run(&mut state, &topic, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.depth, DEFAULT_MAX_DEPTH);
        assert_eq!(outcome.score, 3);
        assert_eq!(*responder.asked.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(state.memory.get("mood").unwrap().statements().len(), 3);
        assert_eq!(state.questions_asked(), 3);
        // identification + 3 questions + 3 answers
        assert_eq!(state.transcript.len(), 7);
    }

    #[tokio::test]
    async fn some_necessity_stops_after_two() {
        let oracle = oracle();
        oracle.always(OracleRole::NecessityRater, "1");
        oracle.push(OracleRole::Scorer, r#"{"score": 1, "summary": "mild"}"#);
        let client = OracleClient::new(oracle.clone());
        let responder = EchoResponder::new();
        let mut state = state();
        let topic = state.scale.topics()[0].clone();

        let outcome = TopicScheduler::new(&client, &responder)
            .run(&mut state, &topic, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.depth, 2);
        assert_eq!(oracle.calls_for(OracleRole::NecessityRater), 2);
    }

    #[tokio::test]
    async fn necessity_failure_stops_at_depth_one() {
        let oracle = oracle();
        oracle.fail(OracleRole::NecessityRater, OracleError::Transport("reset".into()));
        oracle.push(OracleRole::Scorer, r#"{"score": 2, "summary": "some low mood"}"#);
        let client = OracleClient::new(oracle.clone());
        let responder = EchoResponder::new();
        let mut state = state();
        let topic = state.scale.topics()[0].clone();

        let outcome = TopicScheduler::new(&client, &responder)
            .run(&mut state, &topic, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.depth, 1);
        assert_eq!(outcome.score, 2);
        assert_eq!(
            state.memory.get("mood").unwrap().status(),
            crate::memory::TopicStatus::Completed
        );
    }

    #[tokio::test]
    async fn interviewer_failure_uses_fallback_question() {
        let oracle = Arc::new(ScriptedOracle::new());
        oracle.push(OracleRole::NecessityRater, "0");
        let client = OracleClient::new(oracle.clone());
        let responder = EchoResponder::new();
        let mut state = state();
        let topic = state.scale.topics()[0].clone();

        let outcome = TopicScheduler::new(&client, &responder)
            .run(&mut state, &topic, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(state.last_question, FALLBACK_QUESTION);
        assert!(outcome.score_fallback);
        assert_eq!(outcome.score, 0);
        assert_eq!(outcome.summary, "");
    }

    #[tokio::test]
    async fn followup_request_lists_other_topics() {
        let oracle = oracle();
        oracle.push(OracleRole::NecessityRater, "2");
        oracle.push(OracleRole::NecessityRater, "0");
        oracle.push(OracleRole::Scorer, r#"{"score": 2, "summary": "x"}"#);
        let client = OracleClient::new(oracle.clone());
        let responder = EchoResponder::new();
        let mut state = state();
        let topic = state.scale.topics()[0].clone();

        TopicScheduler::new(&client, &responder)
            .run(&mut state, &topic, &CancellationToken::new())
            .await
            .unwrap();

        let questions: Vec<_> = oracle
            .calls()
            .into_iter()
            .filter(|r| r.role == OracleRole::Interviewer)
            .collect();
        assert_eq!(questions.len(), 2);
        assert!(questions[0].prompt.starts_with("Type: initial"));
        assert!(!questions[0].prompt.contains("Other Topics"));
        assert!(questions[1].prompt.starts_with("Type: followup"));
        assert!(questions[1].prompt.contains("Other Topics: sleep"));
        assert!(questions[1].prompt.contains("Last Response: Most days I feel low"));
    }

    #[tokio::test]
    async fn cancelled_topic_is_not_completed() {
        let oracle = oracle();
        let client = OracleClient::new(oracle.clone());
        let responder = EchoResponder::new();
        let mut state = state();
        let topic = state.scale.topics()[0].clone();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = TopicScheduler::new(&client, &responder)
            .run(&mut state, &topic, &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, SessionError::Cancelled));
        assert_eq!(
            state.memory.get("mood").unwrap().status(),
            crate::memory::TopicStatus::Open
        );
        assert_eq!(oracle.calls_for(OracleRole::Scorer), 0);
    }

    #[test]
    fn out_of_range_score_keeps_summary() {
        let reply = parse_score_reply(r#"{"score": 7, "summary": "very severe"}"#).unwrap();
        let validated = validate_score(Parsed::Value(reply), &rubric());
        assert_eq!(validated.value(), &(0, "very severe".to_string()));
        assert!(matches!(validated.reason(), Some(FallbackReason::OutOfRange(_))));

        let reply = parse_score_reply(r#"{"score": "two", "summary": "unclear"}"#).unwrap();
        let validated = validate_score(Parsed::Value(reply), &rubric());
        assert_eq!(validated.into_value(), (0, "unclear".to_string()));
    }

    #[test]
    fn quoted_scores_are_not_integers() {
        let reply = parse_score_reply(r#"{"score": "3", "summary": "ok"}"#).unwrap();
        assert_eq!(reply.score, None);

        let validated = validate_score(Parsed::Value(reply), &rubric());
        assert!(matches!(validated.reason(), Some(FallbackReason::OutOfRange(_))));
        assert_eq!(validated.into_value(), (0, "ok".to_string()));
    }
}
