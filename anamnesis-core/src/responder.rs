//! Sources of subject answers.

use async_trait::async_trait;

use crate::error::Result;
use crate::oracle::prompts::FALLBACK_ANSWER;
use crate::oracle::{OracleClient, OracleRequest, OracleRole};
use crate::scale::Topic;
use crate::session::{QaPair, render_history};
use crate::subject::SubjectRecord;

/// What the subject is being asked about.
#[derive(Debug, Clone, Copy)]
pub enum Stage<'a> {
    /// Demographic intake before the first topic. `attempt` starts at 1.
    Intake { attempt: u32 },
    /// A question within a topic. `depth` 0 is the opening question.
    Topic {
        topic: &'a Topic,
        depth: u32,
        history: &'a [QaPair],
    },
}

#[derive(Debug, Clone, Copy)]
pub struct ResponderPrompt<'a> {
    pub question: &'a str,
    pub stage: Stage<'a>,
}

/// Produces the subject's answer to each question.
#[async_trait]
pub trait Responder: Send + Sync {
    /// Answer one question. An error ends the session.
    async fn respond(&self, prompt: &ResponderPrompt<'_>) -> Result<String>;

    /// How many times intake may be asked before falling back to an
    /// unspecified profile.
    fn intake_attempts(&self) -> u32 {
        1
    }
}

/// Oracle-backed stand-in for a real subject, grounded on a reference
/// interview and its clinician scores.
#[derive(Debug, Clone)]
pub struct SimulatedResponder {
    oracle: OracleClient,
    record: SubjectRecord,
    context: String,
}

impl SimulatedResponder {
    pub fn new(oracle: OracleClient, record: SubjectRecord) -> Self {
        let context = format!(
            "Reference interview of the client you play:\n{}\n\nClinician item scores for this client:\n{}",
            record.interview_text(),
            record.scores_text()
        );
        Self {
            oracle,
            record,
            context,
        }
    }

    pub fn record(&self) -> &SubjectRecord {
        &self.record
    }

    fn request_text(prompt: &ResponderPrompt<'_>) -> String {
        let question = prompt.question;
        match prompt.stage {
            Stage::Intake { .. } => format!(
                "Please answer the following question:\n{question}\n\n\
                 Give your basic information as 'age:<age>, gender:<gender>, occupation:<occupation>' \
                 (e.g. age:25, gender:male, occupation:engineer). If the interview does not state them, \
                 infer plausible values from its context. Gender must be one of male, female, other. \
                 Reply with that line only."
            ),
            Stage::Topic { depth: 0, .. } => format!(
                "Please answer the following question:\n{question}\n\n\
                 Answer truthfully and reasonably, consistent with your reference interview and profile, \
                 in no more than 50 words."
            ),
            Stage::Topic { topic, history, .. } => format!(
                "Please answer the following in-depth question:\n{question}\n\n\
                 Scoring standard for '{}':\n{}\n\n\
                 Your previous answers on this topic:\n{}\n\n\
                 Answer consistently with the interview and your previous answers. Do not fabricate \
                 symptoms. If the question goes beyond what the interview tells you, you may say you \
                 are not sure, sparingly and with a reason that fits the client. At most 50 words.",
                topic.name,
                topic.rubric.describe(),
                render_history(history),
            ),
        }
    }
}

#[async_trait]
impl Responder for SimulatedResponder {
    async fn respond(&self, prompt: &ResponderPrompt<'_>) -> Result<String> {
        let request = OracleRequest::new(OracleRole::Respondent, Self::request_text(prompt))
            .with_context(self.context.clone());
        Ok(self
            .oracle
            .ask_text(&request, FALLBACK_ANSWER)
            .await
            .into_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scale::Rubric;
    use crate::subject::Utterance;
    use crate::testing::ScriptedOracle;
    use serde_json::json;
    use std::sync::Arc;

    fn record() -> SubjectRecord {
        SubjectRecord {
            identifier: Some("S001".into()),
            interview: vec![Utterance {
                role: "Participant".into(),
                content: "i have been sleeping badly".into(),
            }],
            reference_scores: json!({"items": {"sleep": 2}}),
        }
    }

    fn topic() -> Topic {
        Topic {
            name: "sleep".into(),
            examples: Vec::new(),
            rubric: Rubric::new([(0, "none".to_string()), (1, "some".to_string())]),
        }
    }

    #[tokio::test]
    async fn simulated_answer_is_grounded_on_record() {
        let oracle = Arc::new(ScriptedOracle::new());
        oracle.push(OracleRole::Respondent, "I wake up at four most nights.");
        let responder = SimulatedResponder::new(OracleClient::new(oracle.clone()), record());
        let topic = topic();
        let prompt = ResponderPrompt {
            question: "How have you been sleeping?",
            stage: Stage::Topic {
                topic: &topic,
                depth: 0,
                history: &[],
            },
        };

        let answer = responder.respond(&prompt).await.unwrap();

        assert_eq!(answer, "I wake up at four most nights.");
        let system = oracle.calls()[0].system();
        assert!(system.contains("Participant: i have been sleeping badly"));
        assert!(system.contains("sleep: 2"));
    }

    #[tokio::test]
    async fn followup_prompt_carries_rubric_and_history() {
        let oracle = Arc::new(ScriptedOracle::new());
        oracle.push(OracleRole::Respondent, "Maybe three nights a week.");
        let responder = SimulatedResponder::new(OracleClient::new(oracle.clone()), record());
        let topic = topic();
        let history = [QaPair {
            question: "How have you been sleeping?".into(),
            answer: "Badly.".into(),
        }];
        let prompt = ResponderPrompt {
            question: "How often?",
            stage: Stage::Topic {
                topic: &topic,
                depth: 1,
                history: &history,
            },
        };

        responder.respond(&prompt).await.unwrap();

        let sent = &oracle.calls()[0].prompt;
        assert!(sent.contains("1 - some"));
        assert!(sent.contains("A: Badly."));
    }

    #[tokio::test]
    async fn failure_yields_fallback_answer() {
        let oracle = Arc::new(ScriptedOracle::new());
        let responder = SimulatedResponder::new(OracleClient::new(oracle), record());
        let prompt = ResponderPrompt {
            question: "How old are you?",
            stage: Stage::Intake { attempt: 1 },
        };

        assert_eq!(responder.respond(&prompt).await.unwrap(), FALLBACK_ANSWER);
        assert_eq!(responder.intake_attempts(), 1);
    }
}
