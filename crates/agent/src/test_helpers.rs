//! Shared test helpers for turn and host tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use agentweave_core::error::ProviderError;
use agentweave_core::message::{ActionReport, AgentRef, ConversationId, Message};
use agentweave_core::plan::ActionKind;
use agentweave_core::provider::{ChunkReceiver, Provider, ProviderRequest, StreamChunk};
use agentweave_core::resource::{ActionContext, ActionRequest, Resource};
use agentweave_memory::{ConversationMemoryEngine, InMemoryConversationStore};
use async_trait::async_trait;

use crate::verify::{Verdict, Verifier};

/// What the scripted provider does for one request.
#[derive(Clone)]
pub enum Script {
    Reply(&'static str),
    Think(&'static str, &'static str),
    Fail(ProviderError),
    FailMidStream(&'static str, ProviderError),
}

/// A provider answering from per-model scripts.
///
/// Each request pops the next script of its model; the last script repeats.
/// Models without a script fail with `ModelNotFound`.
pub struct ScriptedProvider {
    scripts: Mutex<HashMap<String, VecDeque<Script>>>,
    pub requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn on(self, model: &str, scripts: Vec<Script>) -> Self {
        self.scripts.lock().unwrap().insert(model.to_string(), scripts.into());
        self
    }

    pub fn models_called(&self) -> Vec<String> {
        self.requests.lock().unwrap().iter().map(|r| r.model.clone()).collect()
    }

    fn next_script(&self, model: &str) -> Option<Script> {
        let mut scripts = self.scripts.lock().unwrap();
        let queue = scripts.get_mut(model)?;
        if queue.len() > 1 { queue.pop_front() } else { queue.front().cloned() }
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        let model = request.model.clone();
        self.requests.lock().unwrap().push(request);
        let script = self
            .next_script(&model)
            .ok_or_else(|| ProviderError::ModelNotFound(model.clone()))?;

        let (tx, rx) = tokio::sync::mpsc::channel(8);
        match script {
            Script::Fail(e) => return Err(e),
            Script::Reply(text) => {
                tx.send(Ok(StreamChunk::content(text))).await.unwrap();
                tx.send(Ok(StreamChunk::done())).await.unwrap();
            }
            Script::Think(thinking, text) => {
                tx.send(Ok(StreamChunk::thinking(thinking))).await.unwrap();
                tx.send(Ok(StreamChunk::content(text))).await.unwrap();
                tx.send(Ok(StreamChunk::done())).await.unwrap();
            }
            Script::FailMidStream(partial, e) => {
                tx.send(Ok(StreamChunk::content(partial))).await.unwrap();
                tx.send(Err(e)).await.unwrap();
            }
        }
        Ok(rx)
    }
}

pub struct RejectAll;

#[async_trait]
impl Verifier for RejectAll {
    fn name(&self) -> &str {
        "reject_all"
    }

    async fn verify(&self, _received: &Message, _candidate: &Message) -> Verdict {
        Verdict::Reject("never good enough".into())
    }
}

/// Tool resource answering from a script and recording chained inputs.
pub struct ScriptedTool {
    reports: Mutex<VecDeque<ActionReport>>,
    pub inputs: Mutex<Vec<Option<String>>>,
}

impl ScriptedTool {
    pub fn new(reports: Vec<ActionReport>) -> Self {
        Self {
            reports: Mutex::new(reports.into()),
            inputs: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Resource for ScriptedTool {
    fn name(&self) -> &str {
        "scripted_tool"
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Tool
    }

    async fn execute(&self, _request: &ActionRequest, ctx: &ActionContext) -> ActionReport {
        self.inputs.lock().unwrap().push(ctx.previous_output.clone());
        self.reports
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| ActionReport::ok("tool default"))
    }
}

pub fn memory() -> Arc<ConversationMemoryEngine> {
    Arc::new(ConversationMemoryEngine::new(Arc::new(InMemoryConversationStore::new())))
}

pub fn conv() -> ConversationId {
    ConversationId::from("c1")
}

/// A user message for `agent` at `rounds`.
pub fn user_message(agent: &str, content: &str, rounds: u64) -> Message {
    Message::user(conv(), AgentRef::new(agent, "Solver"), content).with_rounds(rounds)
}
