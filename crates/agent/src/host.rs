//! Host: the explicit context handle of an agentweave process.
//!
//! A [`Host`] owns the memory engine, the event bus, the model provider and
//! the registry of agents. Resources, the fragment backend and the verifier
//! are bound once and handed to every agent registered afterwards.
//!
//! Delegation between agents goes through [`DelegationResource`], which
//! holds a `Weak<Host>` so the registry never owns itself.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use agentweave_core::agent::AgentProfile;
use agentweave_core::event::EventBus;
use agentweave_core::memory::MemoryBackend;
use agentweave_core::message::{ActionReport, AgentRef, ConversationId, Message};
use agentweave_core::plan::ActionKind;
use agentweave_core::provider::Provider;
use agentweave_core::resource::{ActionContext, ActionRequest, Resource};
use agentweave_core::visualizer::Visualizer;
use agentweave_memory::{ConversationCache, ConversationHistory, ConversationMemoryEngine};
use agentweave_providers::ModelFallback;
use async_trait::async_trait;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::turn::{AgentTurnEngine, TurnSettings};
use crate::verify::{AcceptAll, Verifier};

pub struct Host {
    memory: Arc<ConversationMemoryEngine>,
    events: Arc<EventBus>,
    provider: Arc<dyn Provider>,
    models: ModelFallback,
    settings: TurnSettings,
    resources: RwLock<Vec<Arc<dyn Resource>>>,
    fragments: RwLock<Option<Arc<dyn MemoryBackend>>>,
    verifier: RwLock<Arc<dyn Verifier>>,
    agents: RwLock<HashMap<String, Arc<AgentTurnEngine>>>,
}

impl Host {
    pub fn new(
        memory: Arc<ConversationMemoryEngine>,
        provider: Arc<dyn Provider>,
        models: ModelFallback,
        settings: TurnSettings,
    ) -> Arc<Self> {
        Arc::new(Self {
            memory,
            events: Arc::new(EventBus::default()),
            provider,
            models,
            settings,
            resources: RwLock::new(Vec::new()),
            fragments: RwLock::new(None),
            verifier: RwLock::new(Arc::new(AcceptAll)),
            agents: RwLock::new(HashMap::new()),
        })
    }

    pub fn memory(&self) -> &Arc<ConversationMemoryEngine> {
        &self.memory
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    // ── Binding ──

    /// Bind a resource for agents registered from now on.
    pub async fn bind_resource(&self, resource: Arc<dyn Resource>) {
        info!(resource = resource.name(), kind = ?resource.kind(), "Resource bound");
        self.resources.write().await.push(resource);
    }

    /// Bind the fragment backend agents remember attempts in.
    pub async fn bind_memory(&self, fragments: Arc<dyn MemoryBackend>) {
        info!(backend = fragments.name(), "Memory backend bound");
        *self.fragments.write().await = Some(fragments);
    }

    pub async fn bind_verifier(&self, verifier: Arc<dyn Verifier>) {
        *self.verifier.write().await = verifier;
    }

    /// Open a conversation, optionally seeded with persisted history.
    pub async fn bind_context(
        &self,
        conversation_id: &ConversationId,
        history: Option<ConversationHistory>,
        visualizer: Option<Arc<dyn Visualizer>>,
        start_round: u64,
    ) -> Arc<ConversationCache> {
        self.memory.init(conversation_id, history, visualizer, start_round).await
    }

    // ── Registry ──

    /// Materialize `profile` as agent `name` with everything bound so far.
    ///
    /// Unless an agent-kind resource was bound explicitly, the agent can
    /// delegate to every other registered agent.
    pub async fn register_agent(self: &Arc<Self>, name: &str, profile: &AgentProfile) -> Arc<AgentTurnEngine> {
        let mut engine = AgentTurnEngine::new(
            profile.materialize(name),
            self.provider.clone(),
            self.models.clone(),
            self.memory.clone(),
        )
        .with_events(self.events.clone())
        .with_settings(self.settings.clone())
        .with_verifier(self.verifier.read().await.clone());

        let resources = self.resources.read().await;
        if !resources.iter().any(|r| r.kind() == ActionKind::Agent) {
            engine = engine.with_resource(Arc::new(DelegationResource::new(Arc::downgrade(self))));
        }
        for resource in resources.iter() {
            engine = engine.with_resource(resource.clone());
        }
        drop(resources);

        if let Some(fragments) = self.fragments.read().await.clone() {
            engine = engine.with_fragments(fragments);
        }

        let engine = Arc::new(engine);
        if self.agents.write().await.insert(name.to_string(), engine.clone()).is_some() {
            warn!(agent = name, "Agent re-registered, previous engine replaced");
        }
        info!(agent = name, role = %profile.role, "Agent registered");
        engine
    }

    pub async fn agent(&self, name: &str) -> Option<Arc<AgentTurnEngine>> {
        self.agents.read().await.get(name).cloned()
    }

    /// Registered agent names, sorted.
    pub async fn agents(&self) -> Vec<String> {
        let mut names: Vec<String> = self.agents.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    // ── Dispatch ──

    /// Hand a message to its receiver and return the reply.
    pub async fn dispatch(&self, message: Message) -> Message {
        match self.agent(&message.receiver.name).await {
            Some(engine) => engine.generate_reply(message).await,
            None => {
                warn!(
                    conversation_id = %message.conversation_id,
                    receiver = %message.receiver.name,
                    "No agent registered under receiver name"
                );
                let rounds = self.memory.next_round(&message.conversation_id).await;
                let mut reply = Message::new(
                    message.conversation_id.clone(),
                    message.receiver.clone(),
                    message.sender.clone(),
                    format!("Unknown agent: {}", message.receiver.name),
                )
                .with_rounds(rounds);
                reply.success = false;
                reply
            }
        }
    }

    /// Send user `content` to `agent` in a conversation.
    pub async fn chat(&self, conversation_id: &ConversationId, agent: &str, content: &str) -> Message {
        let receiver = match self.agent(agent).await {
            Some(engine) => engine.spec().agent_ref(),
            None => AgentRef::new(agent, "unknown"),
        };
        let rounds = self.memory.next_round(conversation_id).await;
        let message = Message::user(conversation_id.clone(), receiver, content).with_rounds(rounds);
        self.dispatch(message).await
    }
}

/// Routes delegation actions to agents registered on the host.
pub struct DelegationResource {
    host: Weak<Host>,
}

impl DelegationResource {
    pub fn new(host: Weak<Host>) -> Self {
        Self { host }
    }
}

#[async_trait]
impl Resource for DelegationResource {
    fn name(&self) -> &str {
        "agents"
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Agent
    }

    async fn describe(&self) -> String {
        "agents (delegate a task to another agent by name)".into()
    }

    async fn execute(&self, request: &ActionRequest, ctx: &ActionContext) -> ActionReport {
        let ActionRequest::AgentDelegation { agent, content } = request else {
            return ActionReport::failed("Delegation resource only handles agent actions", false);
        };
        let Some(host) = self.host.upgrade() else {
            return ActionReport::failed("Host is shut down", false);
        };
        if *agent == ctx.sender.name {
            return ActionReport::failed(format!("{agent} cannot delegate to itself"), false);
        }
        let Some(engine) = host.agent(agent).await else {
            return ActionReport::failed(format!("Unknown agent: {agent}"), false);
        };

        let mut task = content.clone();
        if let Some(input) = &ctx.previous_output {
            task.push_str(&format!("\n\nInput:\n{input}"));
        }
        let rounds = host.memory.next_round(&ctx.conversation_id).await;
        let message = Message::new(ctx.conversation_id.clone(), ctx.sender.clone(), engine.spec().agent_ref(), task)
            .with_rounds(rounds);

        info!(
            conversation_id = %ctx.conversation_id,
            from = %ctx.sender.name,
            to = %agent,
            trace_id = %ctx.trace.trace_id,
            "Delegating"
        );
        let reply = engine.generate_reply(message).await;

        let mut report = if reply.success {
            ActionReport::ok(reply.content.clone())
        } else {
            ActionReport::failed(reply.content.clone(), true)
        };
        report.resource_value = Some(json!({ "agent": agent, "message_id": reply.id }));
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use agentweave_core::trace::TraceContext;
    use agentweave_memory::InMemoryFragmentStore;

    fn host(provider: ScriptedProvider) -> Arc<Host> {
        Host::new(memory(), Arc::new(provider), ModelFallback::new(["model-a"]), TurnSettings::default())
    }

    fn ctx(sender: &str) -> ActionContext {
        ActionContext {
            conversation_id: conv(),
            sender: AgentRef::new(sender, "Planner"),
            rounds: 1,
            previous_output: None,
            trace: TraceContext::new_root(),
        }
    }

    #[tokio::test]
    async fn chat_reaches_registered_agent() {
        let host = host(ScriptedProvider::new().on("model-a", vec![Script::Reply("4")]));
        host.register_agent("solver", &AgentProfile::new("Solver", "solve")).await;

        let reply = host.chat(&conv(), "solver", "2+2?").await;
        assert!(reply.success);
        assert_eq!(reply.content, "4");
        assert_eq!(reply.rounds, 2);
        assert_eq!(host.agents().await, vec!["solver".to_string()]);
    }

    #[tokio::test]
    async fn unknown_receiver_gets_failed_reply() {
        let host = host(ScriptedProvider::new());
        let reply = host.chat(&conv(), "nobody", "hello").await;
        assert!(!reply.success);
        assert!(reply.content.contains("Unknown agent"));
    }

    #[tokio::test]
    async fn registered_agents_get_bound_collaborators() {
        let host = host(ScriptedProvider::new().on("model-a", vec![Script::Reply("4")]));
        let fragments = Arc::new(InMemoryFragmentStore::default());
        host.bind_memory(fragments.clone()).await;

        host.register_agent("solver", &AgentProfile::new("Solver", "solve")).await;
        host.chat(&conv(), "solver", "2+2?").await;
        assert_eq!(fragments.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn bound_verifier_applies_to_new_agents() {
        let host = host(ScriptedProvider::new().on("model-a", vec![Script::Reply("4")]));
        host.bind_verifier(Arc::new(RejectAll)).await;
        host.register_agent("solver", &AgentProfile::new("Solver", "solve")).await;
        assert!(!host.chat(&conv(), "solver", "2+2?").await.success);
    }

    #[tokio::test]
    async fn delegation_runs_target_agent() {
        let provider = ScriptedProvider::new()
            .on("model-a", vec![Script::Reply(r#"{"agent": "coder", "content": "write it"}"#), Script::Reply("done")]);
        let host = host(provider);
        host.register_agent("planner", &AgentProfile::new("Planner", "plan")).await;
        host.register_agent("coder", &AgentProfile::new("Coder", "code")).await;

        let reply = host.chat(&conv(), "planner", "build the parser").await;
        assert!(reply.success);
        assert_eq!(reply.content, "done");

        let report = reply.action_report.unwrap();
        assert_eq!(report.resource_value.unwrap()["agent"], "coder");

        // user, delegated task, coder reply, planner reply
        let messages = host.memory().messages(&conv()).await;
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1].receiver.name, "coder");
        assert!(messages[1].rounds < messages[3].rounds);
    }

    #[tokio::test]
    async fn delegation_appends_chained_input() {
        let provider = ScriptedProvider::new().on("model-a", vec![Script::Reply("ok")]);
        let host = host(provider);
        host.register_agent("coder", &AgentProfile::new("Coder", "code")).await;

        let resource = DelegationResource::new(Arc::downgrade(&host));
        let mut ctx = ctx("planner");
        ctx.previous_output = Some("fn main() {}".into());
        let request = ActionRequest::AgentDelegation { agent: "coder".into(), content: "review".into() };
        let report = resource.execute(&request, &ctx).await;
        assert!(report.success);

        let messages = host.memory().messages(&conv()).await;
        assert_eq!(messages[0].content, "review\n\nInput:\nfn main() {}");
    }

    #[tokio::test]
    async fn delegation_rejects_self_and_unknown() {
        let host = host(ScriptedProvider::new());
        host.register_agent("planner", &AgentProfile::new("Planner", "plan")).await;
        let resource = DelegationResource::new(Arc::downgrade(&host));

        let to_self = ActionRequest::AgentDelegation { agent: "planner".into(), content: "x".into() };
        let report = resource.execute(&to_self, &ctx("planner")).await;
        assert!(!report.success && !report.retryable);

        let unknown = ActionRequest::AgentDelegation { agent: "ghost".into(), content: "x".into() };
        let report = resource.execute(&unknown, &ctx("planner")).await;
        assert!(!report.success && !report.retryable);
    }

    #[tokio::test]
    async fn delegation_after_host_drop_fails() {
        let host = host(ScriptedProvider::new());
        let resource = DelegationResource::new(Arc::downgrade(&host));
        drop(host);

        let request = ActionRequest::AgentDelegation { agent: "coder".into(), content: "x".into() };
        let report = resource.execute(&request, &ctx("planner")).await;
        assert!(!report.success);
        assert_eq!(report.content, "Host is shut down");
    }

    #[tokio::test]
    async fn bind_context_seeds_round_counter() {
        let host = host(ScriptedProvider::new().on("model-a", vec![Script::Reply("4")]));
        host.register_agent("solver", &AgentProfile::new("Solver", "solve")).await;
        host.bind_context(&conv(), None, None, 10).await;

        let reply = host.chat(&conv(), "solver", "2+2?").await;
        assert_eq!(reply.rounds, 12);
    }
}
