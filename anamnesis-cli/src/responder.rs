//! A live subject answering on the terminal.

use std::io::Write;
use std::path::PathBuf;

use anamnesis_core::{Responder, ResponderPrompt, SessionError, Stage};
use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

/// Reads each answer as one non-empty line. End of input closes the session.
pub struct ConsoleResponder<R = BufReader<Stdin>> {
    lines: Mutex<Lines<R>>,
}

impl ConsoleResponder {
    pub fn stdin() -> Self {
        Self::from_reader(BufReader::new(tokio::io::stdin()))
    }
}

impl<R: AsyncBufRead + Unpin> ConsoleResponder<R> {
    pub fn from_reader(reader: R) -> Self {
        Self {
            lines: Mutex::new(reader.lines()),
        }
    }

    async fn read_answer(&self) -> anamnesis_core::Result<String> {
        let mut lines = self.lines.lock().await;
        loop {
            prompt_marker();
            let line = lines.next_line().await.map_err(|source| SessionError::Io {
                path: PathBuf::from("<stdin>"),
                source,
            })?;
            match line {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => return Ok(line.trim().to_string()),
                None => return Err(SessionError::ResponderClosed),
            }
        }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> Responder for ConsoleResponder<R> {
    async fn respond(&self, prompt: &ResponderPrompt<'_>) -> anamnesis_core::Result<String> {
        if let Stage::Topic { topic, depth: 0, .. } = prompt.stage {
            println!("\n[{}]", topic.name);
        }
        println!("Interviewer: {}", prompt.question);
        self.read_answer().await
    }

    fn intake_attempts(&self) -> u32 {
        3
    }
}

fn prompt_marker() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt(question: &str) -> ResponderPrompt<'_> {
        ResponderPrompt {
            question,
            stage: Stage::Intake { attempt: 1 },
        }
    }

    #[tokio::test]
    async fn blank_lines_are_skipped() {
        let responder = ConsoleResponder::from_reader(&b"\n   \n  I sleep badly  \nnext\n"[..]);

        let first = responder.respond(&prompt("How do you sleep?")).await.unwrap();
        let second = responder.respond(&prompt("And then?")).await.unwrap();

        assert_eq!(first, "I sleep badly");
        assert_eq!(second, "next");
    }

    #[tokio::test]
    async fn end_of_input_closes_the_session() {
        let responder = ConsoleResponder::from_reader(&b"only answer\n"[..]);

        responder.respond(&prompt("q1")).await.unwrap();
        let err = responder.respond(&prompt("q2")).await.unwrap_err();

        assert!(matches!(err, SessionError::ResponderClosed));
    }

    #[test]
    fn intake_is_retried() {
        let responder = ConsoleResponder::from_reader(&b""[..]);
        assert_eq!(responder.intake_attempts(), 3);
    }
}
