//! Agent turn engine: one agent's reply to one received message.
//!
//! A turn runs `Idle → Thinking → Acting → Verifying` and then either
//! accepts the candidate, retries (`Retrying → Thinking`) or aborts. Every
//! path ends in a reply [`Message`]: provider failures and closed
//! conversations become a synthetic reply with `success = false`.
//!
//! Per attempt the engine writes a memory fragment, moves the plan the
//! received message belongs to, and streams model deltas to subscribers.
//! The reply itself is appended and persisted once, when the attempt settles.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use agentweave_config::AppConfig;
use agentweave_core::agent::AgentSpec;
use agentweave_core::error::{MemoryError, ProviderError};
use agentweave_core::event::{DomainEvent, EventBus};
use agentweave_core::memory::{FragmentKind, MemoryBackend, MemoryFragment};
use agentweave_core::message::{ActionReport, AgentMessage, ConversationId, Message};
use agentweave_core::plan::{ActionKind, PlanPatch, PlanState};
use agentweave_core::provider::{Provider, ProviderRequest};
use agentweave_core::resource::{ActionContext, Resource};
use agentweave_core::trace::TraceContext;
use agentweave_core::visualizer::StreamDelta;
use agentweave_core::action_id;
use agentweave_memory::ConversationMemoryEngine;
use agentweave_providers::ModelFallback;
use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::action::{parse_actions, parse_review};
use crate::prompt::PromptBuilder;
use crate::verify::{precheck, AcceptAll, Verdict, Verifier};

/// Knobs of the reply loop.
#[derive(Debug, Clone)]
pub struct TurnSettings {
    /// Attempts per reply before giving up
    pub max_retry_count: u32,

    /// Keep producing steps after an accepted one
    pub loop_mode: bool,

    /// Step cap in loop mode
    pub max_rounds: u32,

    /// Models tried per think step
    pub model_selection_attempts: u32,

    /// Memory fragments rendered into the prompt
    pub memory_window: usize,

    pub temperature: f32,

    pub max_tokens: Option<u32>,
}

impl Default for TurnSettings {
    fn default() -> Self {
        Self {
            max_retry_count: 3,
            loop_mode: false,
            max_rounds: 20,
            model_selection_attempts: 3,
            memory_window: 5,
            temperature: 0.7,
            max_tokens: None,
        }
    }
}

impl TurnSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        let agent = &config.agent;
        Self {
            max_retry_count: agent.max_retry_count.max(1),
            loop_mode: agent.loop_mode,
            max_rounds: agent.max_rounds.max(1),
            model_selection_attempts: agent.model_selection_attempts.max(1),
            memory_window: agent.memory_window,
            temperature: config.default_temperature,
            max_tokens: Some(config.default_max_tokens),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Thinking,
    Acting,
    Verifying,
    Retrying,
    Accepted,
    Aborted,
}

impl TurnState {
    pub fn can_advance_to(self, next: TurnState) -> bool {
        use TurnState::*;
        matches!(
            (self, next),
            (Idle, Thinking)
                | (Thinking, Acting)
                | (Thinking, Aborted)
                | (Acting, Verifying)
                | (Verifying, Accepted)
                | (Verifying, Retrying)
                | (Verifying, Aborted)
                | (Retrying, Thinking)
                | (Accepted, Thinking)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TurnState::Idle => "idle",
            TurnState::Thinking => "thinking",
            TurnState::Acting => "acting",
            TurnState::Verifying => "verifying",
            TurnState::Retrying => "retrying",
            TurnState::Accepted => "accepted",
            TurnState::Aborted => "aborted",
        }
    }
}

/// State tracker of one running turn.
struct Turn<'a> {
    conversation_id: &'a ConversationId,
    agent: &'a str,
    state: TurnState,
}

impl<'a> Turn<'a> {
    fn new(conversation_id: &'a ConversationId, agent: &'a str) -> Self {
        Self {
            conversation_id,
            agent,
            state: TurnState::Idle,
        }
    }

    fn advance(&mut self, next: TurnState) {
        if !self.state.can_advance_to(next) {
            warn!(
                conversation_id = %self.conversation_id,
                agent = self.agent,
                from = self.state.as_str(),
                to = next.as_str(),
                "Unexpected turn transition"
            );
        }
        debug!(
            conversation_id = %self.conversation_id,
            agent = self.agent,
            from = self.state.as_str(),
            to = next.as_str(),
            "Turn transition"
        );
        self.state = next;
    }
}

/// Output of a think step.
struct Thought {
    /// Message id the model call streamed its deltas under
    stream_id: String,
    content: String,
    thinking: Option<String>,
    model: String,
}

pub struct AgentTurnEngine {
    spec: AgentSpec,
    provider: Arc<dyn Provider>,
    models: ModelFallback,
    memory: Arc<ConversationMemoryEngine>,
    resources: HashMap<ActionKind, Arc<dyn Resource>>,
    fragments: Option<Arc<dyn MemoryBackend>>,
    verifier: Arc<dyn Verifier>,
    events: Arc<EventBus>,
    settings: TurnSettings,
}

impl AgentTurnEngine {
    pub fn new(
        spec: AgentSpec,
        provider: Arc<dyn Provider>,
        models: ModelFallback,
        memory: Arc<ConversationMemoryEngine>,
    ) -> Self {
        Self {
            spec,
            provider,
            models,
            memory,
            resources: HashMap::new(),
            fragments: None,
            verifier: Arc::new(AcceptAll),
            events: Arc::new(EventBus::default()),
            settings: TurnSettings::default(),
        }
    }

    /// Bind a resource for the kind of actions it serves, replacing any previous one.
    pub fn with_resource(mut self, resource: Arc<dyn Resource>) -> Self {
        self.resources.insert(resource.kind(), resource);
        self
    }

    pub fn with_fragments(mut self, fragments: Arc<dyn MemoryBackend>) -> Self {
        self.fragments = Some(fragments);
        self
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn Verifier>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    pub fn with_settings(mut self, settings: TurnSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn spec(&self) -> &AgentSpec {
        &self.spec
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Produce this agent's reply to `received`. Never fails: problems end
    /// up in a reply with `success = false`.
    pub async fn generate_reply(&self, received: Message) -> Message {
        let trace = TraceContext::new_root();
        info!(
            conversation_id = %received.conversation_id,
            agent = %self.spec.name,
            rounds = received.rounds,
            trace_id = %trace.trace_id,
            "Generating reply"
        );

        let outcome = match self.run(&received, &trace).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(
                    conversation_id = %received.conversation_id,
                    agent = %self.spec.name,
                    error = %e,
                    "Turn aborted"
                );
                self.failure_reply(&received, &e).await
            }
        };

        self.events.publish(DomainEvent::TurnFinished {
            conversation_id: received.conversation_id.to_string(),
            agent: self.spec.name.clone(),
            success: outcome.message.success,
            attempts: outcome.attempts,
            timestamp: Utc::now(),
        });
        outcome.into_message()
    }

    async fn run(&self, received: &Message, trace: &TraceContext) -> agentweave_core::Result<AgentMessage> {
        let conversation_id = &received.conversation_id;
        self.memory.register_sender(conversation_id, received.sender.clone()).await;
        self.memory.register_sender(conversation_id, self.spec.agent_ref()).await;
        self.memory.append_message(conversation_id, received.clone(), true).await?;
        self.message_appended(received);

        let mut turn = Turn::new(conversation_id, &self.spec.name);
        let mut steps: Vec<String> = Vec::new();
        loop {
            let may_continue = self.settings.loop_mode && (steps.len() as u32 + 1) < self.settings.max_rounds;
            let outcome = self.run_step(&mut turn, received, &steps, may_continue, trace).await?;

            let terminate = outcome.message.action_report.as_ref().is_some_and(|r| r.terminate);
            if !outcome.message.success || !may_continue || terminate {
                return Ok(outcome);
            }
            debug!(conversation_id = %conversation_id, agent = %self.spec.name, step = steps.len() + 1, "Loop step accepted");
            steps.push(outcome.message.content);
        }
    }

    /// Attempt one reply until it is accepted or the retry budget is spent.
    async fn run_step(
        &self,
        turn: &mut Turn<'_>,
        received: &Message,
        steps: &[String],
        may_continue: bool,
        trace: &TraceContext,
    ) -> agentweave_core::Result<AgentMessage> {
        let conversation_id = &received.conversation_id;
        let mut rounds = self.memory.next_round(conversation_id).await;
        let mut attempt = AgentMessage::new(Message::new(
            conversation_id.clone(),
            self.spec.agent_ref(),
            received.sender.clone(),
            String::new(),
        ));

        loop {
            attempt.attempts += 1;
            self.move_plan(received, PlanPatch::state(PlanState::Running, attempt.attempts - 1))
                .await;

            turn.advance(TurnState::Thinking);
            let thought = match self
                .think(received, steps, attempt.last_failure.as_deref(), rounds, trace)
                .await
            {
                Ok(thought) => thought,
                Err(e) => {
                    turn.advance(TurnState::Aborted);
                    self.move_plan(
                        received,
                        PlanPatch::state(PlanState::Failed, attempt.attempts - 1).with_result(e.to_string()),
                    )
                    .await;
                    return Err(e.into());
                }
            };

            turn.advance(TurnState::Acting);
            let (report, delegated) = self.act(received, &thought.content, trace).await;
            if delegated {
                // Delegated exchanges took rounds of their own; the reply goes after them
                rounds = self.memory.next_round(conversation_id).await;
            }

            turn.advance(TurnState::Verifying);
            let mut candidate = self.candidate(received, rounds, &thought, report);
            let verdict = match precheck(&candidate) {
                Some(verdict) => verdict,
                None => self.verifier.verify(received, &candidate).await,
            };

            match verdict {
                Verdict::Accept => {
                    turn.advance(TurnState::Accepted);
                    self.remember(
                        conversation_id,
                        FragmentKind::Accepted,
                        format!("{} => {}", received.content, candidate.content),
                    )
                    .await;

                    let terminate = candidate.action_report.as_ref().is_some_and(|r| r.terminate);
                    if !may_continue || terminate {
                        self.move_plan(
                            received,
                            PlanPatch::state(PlanState::Complete, attempt.attempts - 1)
                                .with_model(thought.model.clone())
                                .with_result(candidate.content.clone()),
                        )
                        .await;
                    }

                    candidate.success = true;
                    self.deliver(&candidate).await?;
                    attempt.message = candidate;
                    return Ok(attempt);
                }
                Verdict::Reject(reason) => {
                    let retryable = candidate.action_report.as_ref().is_none_or(|r| r.retryable);
                    self.remember(
                        conversation_id,
                        FragmentKind::Failure,
                        format!("Attempt {} rejected: {}", attempt.attempts, reason),
                    )
                    .await;

                    if !retryable || attempt.attempts >= self.settings.max_retry_count {
                        turn.advance(TurnState::Aborted);
                        info!(
                            conversation_id = %conversation_id,
                            agent = %self.spec.name,
                            attempts = attempt.attempts,
                            retryable,
                            reason = %reason,
                            "Giving up on reply"
                        );
                        self.move_plan(
                            received,
                            PlanPatch::state(PlanState::Failed, attempt.attempts - 1)
                                .with_model(thought.model.clone())
                                .with_result(reason.clone()),
                        )
                        .await;

                        candidate.success = false;
                        self.deliver(&candidate).await?;
                        attempt.message = candidate;
                        attempt.last_failure = Some(reason);
                        return Ok(attempt);
                    }

                    turn.advance(TurnState::Retrying);
                    debug!(
                        conversation_id = %conversation_id,
                        agent = %self.spec.name,
                        attempt = attempt.attempts,
                        reason = %reason,
                        "Reply rejected, retrying"
                    );
                    self.move_plan(received, PlanPatch::state(PlanState::Retrying, attempt.attempts))
                        .await;
                    attempt.last_failure = Some(reason);
                }
            }
        }
    }

    // ── Think ──

    async fn think(
        &self,
        received: &Message,
        steps: &[String],
        last_failure: Option<&str>,
        rounds: u64,
        trace: &TraceContext,
    ) -> Result<Thought, ProviderError> {
        let fragments = self.recall(&received.conversation_id).await;
        let messages = PromptBuilder::new(&self.spec)
            .with_resources(self.resource_descriptions().await)
            .with_fragments(&fragments)
            .with_steps(steps)
            .with_last_failure(last_failure)
            .build(received);

        let models = match &self.spec.model {
            Some(preferred) => self.models.prefer(preferred.clone()),
            None => self.models.clone(),
        };

        let mut excluded = HashSet::new();
        let mut last_error = ProviderError::NotConfigured("No model available".into());
        let mut next = models.next(&excluded);
        let mut selection = 0;

        while let Some(model) = next.take() {
            selection += 1;
            let mut request = ProviderRequest::new(model.clone(), messages.clone());
            request.temperature = self.settings.temperature;
            request.max_tokens = self.settings.max_tokens;
            request.trace_id = Some(trace.trace_id.clone());

            // Each call streams under its own id, so deltas of an abandoned
            // call never merge into the reply
            let stream_id = uuid::Uuid::new_v4().to_string();
            match self.stream(request, received, &stream_id, rounds).await {
                Ok((content, thinking)) => {
                    return Ok(Thought {
                        stream_id,
                        content,
                        thinking,
                        model,
                    });
                }
                Err(e) if e.is_retryable() => {
                    excluded.insert(model.clone());
                    if selection < self.settings.model_selection_attempts {
                        next = models.next(&excluded);
                    }
                    warn!(
                        conversation_id = %received.conversation_id,
                        agent = %self.spec.name,
                        model = %model,
                        code = e.code(),
                        error = %e,
                        "Model failed, selecting another"
                    );
                    self.events.publish(DomainEvent::ModelFallback {
                        conversation_id: received.conversation_id.to_string(),
                        failed_model: model,
                        next_model: next.clone(),
                        error_code: e.code(),
                        timestamp: Utc::now(),
                    });
                    last_error = e;
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error)
    }

    /// Run one model call, forwarding every delta to subscribers.
    async fn stream(
        &self,
        request: ProviderRequest,
        received: &Message,
        stream_id: &str,
        rounds: u64,
    ) -> Result<(String, Option<String>), ProviderError> {
        let mut rx = self.provider.stream(request).await?;
        let mut content = String::new();
        let mut thinking = String::new();

        while let Some(item) = rx.recv().await {
            let chunk = item?;
            if chunk.thinking.is_some() || chunk.content.is_some() {
                if let Some(text) = &chunk.thinking {
                    thinking.push_str(text);
                }
                if let Some(text) = &chunk.content {
                    content.push_str(text);
                }
                let delta = StreamDelta {
                    message_id: stream_id.to_string(),
                    rounds,
                    sender: self.spec.name.clone(),
                    thinking: chunk.thinking,
                    content: chunk.content,
                };
                if let Err(e) = self.memory.publish_delta(&received.conversation_id, &delta).await {
                    debug!(conversation_id = %received.conversation_id, error = %e, "Dropping streamed delta");
                }
            }
            if chunk.done {
                break;
            }
        }

        Ok((content, (!thinking.is_empty()).then_some(thinking)))
    }

    async fn resource_descriptions(&self) -> Vec<String> {
        let mut descriptions = Vec::with_capacity(self.resources.len());
        for resource in self.resources.values() {
            descriptions.push(resource.describe().await);
        }
        descriptions.sort();
        descriptions
    }

    async fn recall(&self, conversation_id: &ConversationId) -> Vec<MemoryFragment> {
        let Some(fragments) = &self.fragments else {
            return Vec::new();
        };
        match fragments
            .read(conversation_id, &self.spec.name, self.settings.memory_window)
            .await
        {
            Ok(recalled) => recalled,
            Err(e) => {
                warn!(conversation_id = %conversation_id, error = %e, "Memory recall failed");
                Vec::new()
            }
        }
    }

    // ── Act ──

    /// Execute the actions of a reply; plain text passes through.
    ///
    /// Also tells whether any action delegated to another agent.
    async fn act(&self, received: &Message, content: &str, trace: &TraceContext) -> (ActionReport, bool) {
        let actions = parse_actions(content);
        if actions.is_empty() {
            return (ActionReport::ok(content), false);
        }
        let delegated = actions.iter().any(|a| a.kind() == ActionKind::Agent);

        let mut previous_output: Option<String> = None;
        let mut report = ActionReport::failed("No action executed", false);

        for (index, action) in actions.iter().enumerate() {
            let kind = action.kind();
            let ctx = ActionContext {
                conversation_id: received.conversation_id.clone(),
                sender: self.spec.agent_ref(),
                rounds: received.rounds,
                previous_output: previous_output.take(),
                trace: trace.child(),
            };

            let started = Instant::now();
            report = match self.resources.get(&kind) {
                Some(resource) => resource.execute(action, &ctx).await,
                None => ActionReport::failed(format!("No resource bound for {kind:?} actions"), false),
            };
            report.action_id = received
                .task_uid
                .as_deref()
                .and_then(|uid| action_id::decompose(uid).step)
                .map(|step| action_id::action_id(&step, index as u32));

            let duration_ms = started.elapsed().as_millis() as u64;
            debug!(
                conversation_id = %received.conversation_id,
                agent = %self.spec.name,
                kind = ?kind,
                success = report.success,
                duration_ms,
                "Action executed"
            );
            self.events.publish(DomainEvent::ActionExecuted {
                conversation_id: received.conversation_id.to_string(),
                kind: format!("{kind:?}").to_lowercase(),
                success: report.success,
                duration_ms,
                timestamp: Utc::now(),
            });

            if !report.success {
                break;
            }
            previous_output = Some(report.content.clone());
        }
        (report, delegated)
    }

    // ── Reply ──

    fn candidate(&self, received: &Message, rounds: u64, thought: &Thought, report: ActionReport) -> Message {
        let mut reply = Message::new(
            received.conversation_id.clone(),
            self.spec.agent_ref(),
            received.sender.clone(),
            report.content.clone(),
        )
        .with_rounds(rounds)
        .with_visible(self.spec.visible)
        .with_goal(self.spec.goal.clone());

        reply.id = thought.stream_id.clone();
        reply.thinking = thought.thinking.clone();
        reply.model_name = Some(thought.model.clone());
        reply.review_info = parse_review(&thought.content);
        reply.resource_info = report.view.clone();
        reply.task_uid = received.task_uid.clone();
        reply.action_report = Some(report);
        reply
    }

    /// Append a settled reply and publish the updated view.
    async fn deliver(&self, reply: &Message) -> Result<(), MemoryError> {
        let conversation_id = &reply.conversation_id;
        self.memory.append_message(conversation_id, reply.clone(), true).await?;
        self.message_appended(reply);
        self.memory.publish(conversation_id).await
    }

    async fn failure_reply(&self, received: &Message, error: &agentweave_core::Error) -> AgentMessage {
        let conversation_id = &received.conversation_id;
        let rounds = self.memory.next_round(conversation_id).await;
        let mut reply = Message::new(
            conversation_id.clone(),
            self.spec.agent_ref(),
            received.sender.clone(),
            format!("{} could not reply: {error}", self.spec.name),
        )
        .with_rounds(rounds)
        .with_goal(self.spec.goal.clone());
        reply.success = false;
        reply.task_uid = received.task_uid.clone();

        if let Err(e) = self.deliver(&reply).await {
            warn!(conversation_id = %conversation_id, error = %e, "Failure reply not recorded");
        }

        let mut outcome = AgentMessage::new(reply);
        outcome.last_failure = Some(error.to_string());
        outcome
    }

    fn message_appended(&self, message: &Message) {
        self.events.publish(DomainEvent::MessageAppended {
            conversation_id: message.conversation_id.to_string(),
            sender: message.sender.name.clone(),
            rounds: message.rounds,
            timestamp: Utc::now(),
        });
    }

    // ── Side effects ──

    async fn remember(&self, conversation_id: &ConversationId, kind: FragmentKind, content: String) {
        let Some(fragments) = &self.fragments else {
            return;
        };
        let fragment = MemoryFragment::new(conversation_id.clone(), self.spec.name.clone(), kind, content);
        if let Err(e) = fragments.write(fragment).await {
            warn!(conversation_id = %conversation_id, error = %e, "Failed to write memory fragment");
        }
    }

    /// Move the plan of the received message, if it has one.
    async fn move_plan(&self, received: &Message, patch: PlanPatch) {
        let Some(task_uid) = &received.task_uid else {
            return;
        };
        let conversation_id = &received.conversation_id;
        match self.memory.update_plan_state(conversation_id, task_uid, patch).await {
            Ok(plan) => {
                self.events.publish(DomainEvent::PlanStateChanged {
                    conversation_id: conversation_id.to_string(),
                    task_uid: plan.task_uid,
                    state: plan.state,
                    retry_count: plan.retry_count,
                    timestamp: Utc::now(),
                });
            }
            Err(MemoryError::PlanNotFound(_)) => {
                debug!(conversation_id = %conversation_id, task_uid = %task_uid, "No plan to update");
            }
            Err(e) => {
                warn!(conversation_id = %conversation_id, task_uid = %task_uid, error = %e, "Plan update rejected");
            }
        }
    }
}
