//! End-to-end integration tests for the agentweave orchestration core.
//!
//! These tests wire the real memory engine, turn engine, host and tool
//! client together and replace only the remote collaborators (model
//! serving and tool transport) with scripted stand-ins.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agentweave_agent::{AgentTurnEngine, Host, TurnSettings, Verdict, Verifier};
use agentweave_core::agent::AgentProfile;
use agentweave_core::error::{MemoryError, ProviderError, ToolError};
use agentweave_core::message::{AgentRef, ConversationId, Message};
use agentweave_core::plan::{Plan, PlanState};
use agentweave_core::provider::{ChunkReceiver, Provider, ProviderRequest, StreamChunk};
use agentweave_core::tool::{ToolCall, ToolDefinition, ToolResult};
use agentweave_memory::{ConversationMemoryEngine, InMemoryConversationStore};
use agentweave_providers::ModelFallback;
use agentweave_security::AuditLogger;
use agentweave_tools::{ToolEndpoint, ToolInvocationClient, ToolResource, ToolTransport};
use futures::StreamExt;

// ── Mock Provider ────────────────────────────────────────────────────────

/// A mock provider answering each model from its own queue of replies.
///
/// `Err` entries fail the request; the last entry of a queue repeats.
struct ScriptedProvider {
    replies: Mutex<HashMap<String, VecDeque<Result<String, ProviderError>>>>,
    calls: Mutex<Vec<String>>,
    system_prompts: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    fn new() -> Self {
        Self {
            replies: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            system_prompts: Mutex::new(Vec::new()),
        }
    }

    fn model(self, name: &str, replies: Vec<Result<&str, ProviderError>>) -> Self {
        let queue = replies.into_iter().map(|r| r.map(String::from)).collect();
        self.replies.lock().unwrap().insert(name.to_string(), queue);
        self
    }

    fn text(model: &str, reply: &str) -> Self {
        Self::new().model(model, vec![Ok(reply)])
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        self.calls.lock().unwrap().push(request.model.clone());
        if let Some(system) = request.messages.first() {
            self.system_prompts.lock().unwrap().push(system.content.clone());
        }
        let next = {
            let mut replies = self.replies.lock().unwrap();
            let queue = replies
                .get_mut(&request.model)
                .ok_or_else(|| ProviderError::ModelNotFound(request.model.clone()))?;
            if queue.len() > 1 { queue.pop_front() } else { queue.front().cloned() }
        };
        let reply = next.unwrap_or_else(|| Ok(String::new()))?;

        let (tx, rx) = tokio::sync::mpsc::channel(4);
        tx.send(Ok(StreamChunk::content(reply))).await.unwrap();
        tx.send(Ok(StreamChunk::done())).await.unwrap();
        Ok(rx)
    }
}

// ── Mock Tool Transport ──────────────────────────────────────────────────

/// A tool server that adds two numbers and records what it was sent.
struct AddingTransport {
    calls: Mutex<Vec<(HashMap<String, String>, ToolCall)>>,
}

#[async_trait::async_trait]
impl ToolTransport for AddingTransport {
    async fn list(&self, _endpoint: &str, _headers: &HashMap<String, String>) -> Result<Vec<ToolDefinition>, ToolError> {
        Ok(vec![ToolDefinition {
            name: "add".into(),
            description: "Add two numbers".into(),
            parameters: serde_json::json!({"type": "object"}),
        }])
    }

    async fn call(
        &self,
        _endpoint: &str,
        headers: &HashMap<String, String>,
        call: &ToolCall,
    ) -> Result<ToolResult, ToolError> {
        self.calls.lock().unwrap().push((headers.clone(), call.clone()));
        let a = call.arguments["a"].as_i64().unwrap_or_default();
        let b = call.arguments["b"].as_i64().unwrap_or_default();
        Ok(ToolResult {
            call_id: call.id.clone(),
            success: true,
            output: (a + b).to_string(),
            data: None,
        })
    }
}

struct AlwaysReject;

#[async_trait::async_trait]
impl Verifier for AlwaysReject {
    fn name(&self) -> &str {
        "always_reject"
    }

    async fn verify(&self, _received: &Message, _candidate: &Message) -> Verdict {
        Verdict::Reject("not correct".into())
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn conv() -> ConversationId {
    ConversationId::from("e2e")
}

fn memory() -> Arc<ConversationMemoryEngine> {
    Arc::new(ConversationMemoryEngine::new(Arc::new(InMemoryConversationStore::new())))
}

fn solver() -> AgentProfile {
    AgentProfile::new("Solver", "{name} solves arithmetic")
}

fn host_with(provider: ScriptedProvider, models: &[&str]) -> Arc<Host> {
    Host::new(memory(), Arc::new(provider), ModelFallback::new(models.iter().copied()), TurnSettings::default())
}

fn message(rounds: u64, content: &str) -> Message {
    Message::user(conv(), AgentRef::new("solver", "Solver"), content).with_rounds(rounds)
}

// ── End-to-end turns ─────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_two_plus_two() {
    let host = host_with(ScriptedProvider::text("model-a", "4"), &["model-a"]);
    host.register_agent("solver", &solver()).await;

    let reply = host.dispatch(message(7, "2+2?")).await;
    assert!(reply.success);
    assert_eq!(reply.content, "4");
    assert_eq!(reply.rounds, 8);

    let view = host.memory().final_view(&conv()).await;
    assert_eq!(view["type"], "final");
    let messages = view["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1]["content"], "4");
}

#[tokio::test]
async fn e2e_retry_bound() {
    let provider = Arc::new(ScriptedProvider::text("model-a", "5"));
    let engine = AgentTurnEngine::new(solver().materialize("solver"), provider.clone(), ModelFallback::new(["model-a"]), memory())
        .with_verifier(Arc::new(AlwaysReject))
        .with_settings(TurnSettings { max_retry_count: 4, ..Default::default() });

    let reply = engine.generate_reply(message(1, "2+2?")).await;
    assert!(!reply.success);
    assert_eq!(provider.calls().len(), 4);
}

#[tokio::test]
async fn e2e_model_fallback_hides_error() {
    let provider = ScriptedProvider::new()
        .model("model-a", vec![Err(ProviderError::ApiError { code: 503, message: "overloaded".into() })])
        .model("model-b", vec![Ok("4")]);
    let host = host_with(provider, &["model-a", "model-b"]);
    host.register_agent("solver", &solver()).await;

    let reply = host.dispatch(message(1, "2+2?")).await;
    assert!(reply.success);
    assert_eq!(reply.content, "4");
    assert_eq!(reply.model_name.as_deref(), Some("model-b"));
}

#[tokio::test]
async fn e2e_fatal_provider_error_is_a_failed_reply() {
    let provider = ScriptedProvider::new()
        .model("model-a", vec![Err(ProviderError::ApiError { code: -1, message: "bad request".into() })]);
    let host = host_with(provider, &["model-a", "model-b"]);
    host.register_agent("solver", &solver()).await;

    let reply = host.dispatch(message(1, "2+2?")).await;
    assert!(!reply.success);
    assert!(reply.content.contains("bad request"));
    assert_eq!(host.memory().messages(&conv()).await.len(), 2);
}

#[tokio::test]
async fn e2e_plan_completes_with_turn() {
    let host = host_with(ScriptedProvider::text("model-a", "4"), &["model-a"]);
    host.register_agent("solver", &solver()).await;
    host.memory()
        .append_plans(&conv(), vec![Plan::new(conv(), "1-1", "add numbers", "solver", "planner")], true)
        .await
        .unwrap();

    let reply = host.dispatch(message(1, "2+2?").with_task("1-1")).await;
    assert!(reply.success);

    let plan = host.memory().get_plan(&conv(), "1-1").await.unwrap();
    assert_eq!(plan.state, PlanState::Complete);
    assert_eq!(plan.result.as_deref(), Some("4"));
}

#[tokio::test]
async fn e2e_tool_call_through_resource() {
    let transport = Arc::new(AddingTransport { calls: Mutex::new(Vec::new()) });
    let audit = Arc::new(AuditLogger::new());
    let client = Arc::new(ToolInvocationClient::new(transport.clone(), audit.clone()));
    let tools = ToolResource::new("tools", client).with_group("math", ToolEndpoint::new("http://tools.local/rpc"));

    let host = host_with(
        ScriptedProvider::text("model-a", r#"{"tool": "add", "group": "math", "arguments": {"a": 2, "b": 2}}"#),
        &["model-a"],
    );
    host.bind_resource(Arc::new(tools)).await;
    host.register_agent("solver", &solver()).await;

    let reply = host.dispatch(message(1, "2+2?")).await;
    assert!(reply.success);
    assert_eq!(reply.content, "4");

    let calls = transport.calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 1);
    let (headers, call) = &calls[0];
    assert_eq!(call.name, "add");
    assert!(headers.contains_key("x-trace-id"));
    assert_eq!(headers.get("x-call-id"), Some(&call.id));

    // Audit records are written off the call path
    for _ in 0..10 {
        if audit.count() > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(audit.count(), 1);
}

#[tokio::test]
async fn e2e_tool_names_reach_system_prompt() {
    let transport = Arc::new(AddingTransport { calls: Mutex::new(Vec::new()) });
    let client = Arc::new(ToolInvocationClient::new(transport, Arc::new(AuditLogger::new())));
    let tools = ToolResource::new("tools", client).with_group("math", ToolEndpoint::new("http://tools.local/rpc"));

    let provider = Arc::new(ScriptedProvider::text("model-a", "4"));
    let memory = memory();
    let engine = AgentTurnEngine::new(
        solver().materialize("solver"),
        provider.clone(),
        ModelFallback::new(["model-a"]),
        memory,
    )
    .with_resource(Arc::new(tools));

    let reply = engine.generate_reply(message(1, "2+2?")).await;
    assert!(reply.success);

    let prompts = provider.system_prompts.lock().unwrap().clone();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("tools (remote tools; groups: math: [add])"));
}

#[tokio::test]
async fn e2e_delegation_between_agents() {
    let provider = ScriptedProvider::new().model(
        "model-a",
        vec![Ok(r#"{"agent": "solver", "content": "2+2?"}"#), Ok("4")],
    );
    let host = host_with(provider, &["model-a"]);
    host.register_agent("router", &AgentProfile::new("Router", "route work to {name}'s team").silent())
        .await;
    host.register_agent("solver", &solver()).await;

    let reply = host.chat(&conv(), "router", "what is 2+2?").await;
    assert!(reply.success);
    assert_eq!(reply.content, "4");
    assert!(!reply.visible);

    // The router's own reply is hidden in the display view
    let displayed = host.memory().display_messages(&conv()).await;
    let senders: Vec<&str> = displayed.iter().map(|m| m.sender.name.as_str()).collect();
    assert_eq!(senders, vec!["User", "router", "solver"]);
    assert_eq!(displayed[2].content, "4");
}

// ── Memory engine properties ─────────────────────────────────────────────

#[tokio::test]
async fn e2e_eviction_starts_fresh() {
    tokio::time::pause();
    let memory = Arc::new(
        ConversationMemoryEngine::new(Arc::new(InMemoryConversationStore::new())).with_ttl(Duration::from_secs(60)),
    );
    memory.append_message(&conv(), message(1, "first"), false).await.unwrap();
    memory
        .append_plans(&conv(), vec![Plan::new(conv(), "1", "task", "solver", "planner")], false)
        .await
        .unwrap();

    tokio::time::advance(Duration::from_secs(61)).await;
    memory.append_message(&conv(), message(1, "second"), false).await.unwrap();

    let messages = memory.messages(&conv()).await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].content, "second");
    assert!(memory.plans(&conv()).await.is_empty());
}

#[tokio::test]
async fn e2e_display_merge() {
    let memory = memory();
    let hidden = message(2, "routing").with_visible(false).with_goal("solve arithmetic");
    for msg in [message(1, "question"), hidden, message(3, "4")] {
        memory.append_message(&conv(), msg, false).await.unwrap();
    }

    let displayed = memory.display_messages(&conv()).await;
    assert_eq!(displayed.len(), 2);
    assert_eq!(displayed[1].content, "4");
    assert_eq!(displayed[1].current_goal.as_deref(), Some("solve arithmetic"));
}

#[tokio::test]
async fn e2e_concurrent_rounds_are_unique() {
    let memory = memory();
    let handles: Vec<_> = (0..64)
        .map(|_| {
            let memory = memory.clone();
            tokio::spawn(async move { memory.next_round(&conv()).await })
        })
        .collect();

    let mut rounds = Vec::new();
    for handle in handles {
        rounds.push(handle.await.unwrap());
    }
    let unique: HashSet<u64> = rounds.iter().copied().collect();
    assert_eq!(unique.len(), 64);
    assert_eq!(rounds.iter().max(), Some(&64));
}

#[tokio::test]
async fn e2e_stopped_conversation_rejects_writes() {
    let host = host_with(ScriptedProvider::text("model-a", "4"), &["model-a"]);
    host.register_agent("solver", &solver()).await;
    let mut stream = host.memory().subscribe(&conv()).await;

    host.memory().stop(&conv()).await;
    assert!(stream.next().await.is_none());
    assert!(matches!(
        host.memory().publish(&conv()).await,
        Err(MemoryError::ConversationClosed(_))
    ));

    let reply = host.dispatch(message(1, "2+2?")).await;
    assert!(!reply.success);
}
