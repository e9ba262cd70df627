//! Test doubles for the engine.
//!
//! [`ScriptedOracle`] answers each role from its own queue of replies.
//! A role with an empty queue falls back to its standing reply, if one is
//! set, and otherwise fails with a provider error.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::oracle::{Oracle, OracleError, OracleRequest, OracleRole};

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Fail(OracleError),
}

impl Reply {
    fn into_result(self) -> Result<String, OracleError> {
        match self {
            Self::Text(text) => Ok(text),
            Self::Fail(err) => Err(err),
        }
    }
}

#[derive(Debug, Default)]
struct Script {
    queued: HashMap<OracleRole, VecDeque<Reply>>,
    standing: HashMap<OracleRole, Reply>,
    calls: Vec<OracleRequest>,
}

/// An [`Oracle`] with canned replies per role. Every request is recorded.
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    script: Mutex<Script>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue a reply for the next request under `role`.
    pub fn push(&self, role: OracleRole, reply: impl Into<String>) -> &Self {
        self.script()
            .queued
            .entry(role)
            .or_default()
            .push_back(Reply::Text(reply.into()));
        self
    }

    /// Queue a failure for the next request under `role`.
    pub fn fail(&self, role: OracleRole, err: OracleError) -> &Self {
        self.script()
            .queued
            .entry(role)
            .or_default()
            .push_back(Reply::Fail(err));
        self
    }

    /// Reply used for `role` whenever its queue is empty.
    pub fn always(&self, role: OracleRole, reply: impl Into<String>) -> &Self {
        self.script()
            .standing
            .insert(role, Reply::Text(reply.into()));
        self
    }

    /// Failure used for `role` whenever its queue is empty.
    pub fn always_fail(&self, role: OracleRole, err: OracleError) -> &Self {
        self.script().standing.insert(role, Reply::Fail(err));
        self
    }

    /// Every request received so far, in order.
    pub fn calls(&self) -> Vec<OracleRequest> {
        self.script().calls.clone()
    }

    /// Number of requests received under `role`.
    pub fn calls_for(&self, role: OracleRole) -> usize {
        self.script().calls.iter().filter(|r| r.role == role).count()
    }
}

#[async_trait]
impl Oracle for ScriptedOracle {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn ask(&self, request: &OracleRequest) -> Result<String, OracleError> {
        let mut script = self.script();
        script.calls.push(request.clone());
        let queued = script
            .queued
            .get_mut(&request.role)
            .and_then(VecDeque::pop_front);
        let reply = queued.or_else(|| script.standing.get(&request.role).cloned());
        match reply {
            Some(reply) => reply.into_result(),
            None => Err(OracleError::Provider(format!(
                "no scripted reply for {}",
                request.role
            ))),
        }
    }
}
