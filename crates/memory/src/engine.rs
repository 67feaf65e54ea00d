//! Conversation memory engine: the single authority for conversation state.
//!
//! Owns at most one live [`ConversationCache`] per conversation id. Reads and
//! writes are routed to the cache; durable writes are queued to one writer
//! task per cache, which forwards them to the [`ConversationStore`] in issue
//! order so the caller never waits on persistence. Idle caches expire after a
//! TTL and are replaced by empty ones on the next access. A stopped
//! conversation stays stopped across expiry.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};
use std::time::Duration;

use agentweave_core::error::MemoryError;
use agentweave_core::message::{AgentRef, ConversationId, Message};
use agentweave_core::persistence::ConversationStore;
use agentweave_core::plan::{Plan, PlanPatch};
use agentweave_core::visualizer::{StreamDelta, Visualizer};
use futures::stream::{BoxStream, StreamExt};
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};

use crate::cache::{ConversationCache, Outbound, PersistOp};
use crate::display::merge_for_display;
use crate::visualizer::PassthroughVisualizer;

/// Shortest interval the janitor will tick at.
const MIN_JANITOR_INTERVAL: Duration = Duration::from_secs(1);

/// Persisted state used to seed a cache.
#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    pub messages: Vec<Message>,
    pub plans: Vec<Plan>,
}

pub struct ConversationMemoryEngine {
    caches: RwLock<HashMap<ConversationId, Arc<ConversationCache>>>,
    /// Stopped conversation ids; outlives the caches themselves
    stopped: RwLock<HashSet<ConversationId>>,
    store: Arc<dyn ConversationStore>,
    visualizer: Arc<dyn Visualizer>,
    ttl: Duration,
    max_chat_round: usize,
    pacing: Duration,
}

impl ConversationMemoryEngine {
    pub fn new(store: Arc<dyn ConversationStore>) -> Self {
        Self {
            caches: RwLock::new(HashMap::new()),
            stopped: RwLock::new(HashSet::new()),
            store,
            visualizer: Arc::new(PassthroughVisualizer),
            ttl: Duration::from_secs(3600),
            max_chat_round: 50,
            pacing: Duration::ZERO,
        }
    }

    /// Idle time after which a cache is evicted.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_max_chat_round(mut self, max_chat_round: usize) -> Self {
        self.max_chat_round = max_chat_round;
        self
    }

    /// Delay applied before each view handed to a subscriber.
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// Visualizer used by caches created without one.
    pub fn with_visualizer(mut self, visualizer: Arc<dyn Visualizer>) -> Self {
        self.visualizer = visualizer;
        self
    }

    // ── Cache lifecycle ──

    /// Fetch the live cache, creating an empty one if it is missing or expired.
    async fn cache(&self, id: &ConversationId) -> Arc<ConversationCache> {
        {
            let caches = self.caches.read().await;
            if let Some(cache) = caches.get(id) {
                if !cache.is_expired(self.ttl) {
                    cache.touch();
                    return cache.clone();
                }
            }
        }

        let mut caches = self.caches.write().await;
        if let Some(cache) = caches.get(id) {
            if !cache.is_expired(self.ttl) {
                cache.touch();
                return cache.clone();
            }
            info!(conversation_id = %id, "Conversation cache expired, starting fresh");
        }

        let cache = Arc::new(ConversationCache::new(id.clone(), None, 0));
        if self.stopped.read().await.contains(id) {
            cache.mark_stopped();
        }
        caches.insert(id.clone(), cache.clone());
        cache
    }

    /// Create (or replace) the cache of a conversation.
    ///
    /// `history` seeds messages and plans; the round counter starts at the
    /// larger of `start_round` and the newest seeded message.
    pub async fn init(
        &self,
        id: &ConversationId,
        history: Option<ConversationHistory>,
        visualizer: Option<Arc<dyn Visualizer>>,
        start_round: u64,
    ) -> Arc<ConversationCache> {
        let cache = Arc::new(ConversationCache::new(id.clone(), visualizer, start_round));
        if self.stopped.read().await.contains(id) {
            cache.mark_stopped();
        }

        if let Some(history) = history {
            let mut state = cache.state.write().await;
            for message in history.messages {
                cache.observe_round(message.rounds);
                state.insert_message(message);
            }
            state.plans.append(history.plans);
        }

        debug!(conversation_id = %id, start_round, "Conversation initialised");
        self.caches.write().await.insert(id.clone(), cache.clone());
        cache
    }

    /// Rebuild a cache from persisted history.
    pub async fn reload(&self, id: &ConversationId) -> Result<Arc<ConversationCache>, MemoryError> {
        let messages = self.store.get_messages(id).await?;
        let plans = self.store.get_plans(id).await?;
        info!(
            conversation_id = %id,
            messages = messages.len(),
            plans = plans.len(),
            "Reloading conversation from {}",
            self.store.name()
        );
        Ok(self.init(id, Some(ConversationHistory { messages, plans }), None, 0).await)
    }

    /// Forget a conversation entirely, including a stop. Returns whether a
    /// cache existed.
    pub async fn clear(&self, id: &ConversationId) -> bool {
        self.stopped.write().await.remove(id);
        self.caches.write().await.remove(id).is_some()
    }

    /// Drop every cache idle for longer than the TTL.
    pub async fn evict_expired(&self) -> usize {
        let mut caches = self.caches.write().await;
        let before = caches.len();
        caches.retain(|_, cache| !cache.is_expired(self.ttl));
        let evicted = before - caches.len();
        if evicted > 0 {
            info!(evicted, remaining = caches.len(), "Evicted idle conversations");
        }
        evicted
    }

    /// Run [`Self::evict_expired`] every `interval` until the engine is dropped.
    ///
    /// Intervals shorter than one second are raised to one second.
    pub fn spawn_janitor(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let interval = if interval < MIN_JANITOR_INTERVAL {
            warn!(
                requested_ms = interval.as_millis() as u64,
                "Janitor interval too short, using {}s",
                MIN_JANITOR_INTERVAL.as_secs()
            );
            MIN_JANITOR_INTERVAL
        } else {
            interval
        };
        let engine: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match engine.upgrade() {
                    Some(engine) => {
                        engine.evict_expired().await;
                    }
                    None => break,
                }
            }
        })
    }

    pub async fn live_conversations(&self) -> usize {
        self.caches.read().await.len()
    }

    // ── Writes ──

    pub async fn append_message(
        &self,
        id: &ConversationId,
        message: Message,
        persist: bool,
    ) -> Result<(), MemoryError> {
        let cache = self.cache(id).await;
        if cache.is_stopped() {
            return Err(MemoryError::ConversationClosed(id.to_string()));
        }

        cache.observe_round(message.rounds);
        let persisted = persist.then(|| message.clone());
        cache.state.write().await.insert_message(message);

        if let Some(message) = persisted {
            self.persist(&cache, PersistOp::Message(message));
        }
        Ok(())
    }

    pub async fn append_plans(
        &self,
        id: &ConversationId,
        plans: Vec<Plan>,
        persist: bool,
    ) -> Result<(), MemoryError> {
        let cache = self.cache(id).await;
        if cache.is_stopped() {
            return Err(MemoryError::ConversationClosed(id.to_string()));
        }

        let persisted = persist.then(|| plans.clone());
        cache.state.write().await.plans.append(plans);

        if let Some(plans) = persisted {
            self.persist(&cache, PersistOp::Plans(plans));
        }
        Ok(())
    }

    /// Replace a plan wholesale.
    pub async fn update_plan(&self, id: &ConversationId, plan: Plan) -> Result<(), MemoryError> {
        let cache = self.cache(id).await;
        if cache.is_stopped() {
            return Err(MemoryError::ConversationClosed(id.to_string()));
        }
        cache.state.write().await.plans.append([plan.clone()]);
        self.persist(&cache, PersistOp::Plans(vec![plan]));
        Ok(())
    }

    /// Patch one plan by task uid and persist the patch.
    pub async fn update_plan_state(
        &self,
        id: &ConversationId,
        task_uid: &str,
        patch: PlanPatch,
    ) -> Result<Plan, MemoryError> {
        let cache = self.cache(id).await;
        if cache.is_stopped() {
            return Err(MemoryError::ConversationClosed(id.to_string()));
        }

        let plan = cache.state.write().await.plans.update(task_uid, &patch)?;
        self.persist(
            &cache,
            PersistOp::PlanPatch {
                task_uid: task_uid.to_string(),
                patch,
            },
        );
        Ok(plan)
    }

    // ── Persistence ──

    /// Hand a durable write to the cache's writer without waiting for it.
    fn persist(&self, cache: &ConversationCache, op: PersistOp) {
        let queued = cache.persist(op, || spawn_writer(self.store.clone(), cache.id().clone()));
        if !queued {
            warn!(conversation_id = %cache.id(), "Store writer gone, dropping durable write");
        }
    }

    pub async fn register_sender(&self, id: &ConversationId, sender: AgentRef) {
        let cache = self.cache(id).await;
        cache.state.write().await.senders.insert(sender.name.clone(), sender);
    }

    /// Allocate the next round number of a conversation.
    pub async fn next_round(&self, id: &ConversationId) -> u64 {
        self.cache(id).await.next_round()
    }

    // ── Reads ──

    /// Messages in round order.
    pub async fn messages(&self, id: &ConversationId) -> Vec<Message> {
        self.cache(id).await.state.read().await.ordered_messages()
    }

    /// Messages as shown to observers, with hidden messages merged away.
    pub async fn display_messages(&self, id: &ConversationId) -> Vec<Message> {
        let messages = self.messages(id).await;
        merge_for_display(&messages, self.max_chat_round)
    }

    /// Plans in tree order.
    pub async fn plans(&self, id: &ConversationId) -> Vec<Plan> {
        let cache = self.cache(id).await;
        let state = cache.state.read().await;
        state.plans.all().into_iter().cloned().collect()
    }

    pub async fn get_plan(&self, id: &ConversationId, task_uid: &str) -> Option<Plan> {
        let cache = self.cache(id).await;
        let state = cache.state.read().await;
        state.plans.get(task_uid).cloned()
    }

    pub async fn senders(&self, id: &ConversationId) -> Vec<AgentRef> {
        let cache = self.cache(id).await;
        let state = cache.state.read().await;
        state.senders.values().cloned().collect()
    }

    pub async fn is_stopped(&self, id: &ConversationId) -> bool {
        self.cache(id).await.is_stopped()
    }

    // ── Views ──

    /// Render the complete display view of a conversation.
    pub async fn final_view(&self, id: &ConversationId) -> serde_json::Value {
        let cache = self.cache(id).await;
        self.render(&cache).await
    }

    async fn render(&self, cache: &ConversationCache) -> serde_json::Value {
        let state = cache.state.read().await;
        let messages = merge_for_display(&state.ordered_messages(), self.max_chat_round);
        let plans: Vec<Plan> = state.plans.all().into_iter().cloned().collect();
        let senders: Vec<AgentRef> = state.senders.values().cloned().collect();
        let visualizer = cache.visualizer().unwrap_or(&self.visualizer);
        visualizer.render_final(&messages, &plans, &senders)
    }

    /// Render the current view and queue it for the subscriber.
    pub async fn publish(&self, id: &ConversationId) -> Result<(), MemoryError> {
        let cache = self.cache(id).await;
        if cache.is_stopped() {
            return Err(MemoryError::ConversationClosed(id.to_string()));
        }
        let view = self.render(&cache).await;
        if !cache.enqueue(Outbound::View(view)) {
            debug!(conversation_id = %id, "No subscriber for published view");
        }
        Ok(())
    }

    /// Queue one streamed delta for the subscriber.
    pub async fn publish_delta(&self, id: &ConversationId, delta: &StreamDelta) -> Result<(), MemoryError> {
        let cache = self.cache(id).await;
        if cache.is_stopped() {
            return Err(MemoryError::ConversationClosed(id.to_string()));
        }
        let visualizer = cache.visualizer().unwrap_or(&self.visualizer);
        let view = visualizer.render_delta(delta);
        cache.enqueue(Outbound::View(view));
        Ok(())
    }

    /// Stream of queued views, ending at the end-of-stream sentinel.
    pub async fn subscribe(&self, id: &ConversationId) -> BoxStream<'static, serde_json::Value> {
        let rx = self.cache(id).await.take_receiver();
        let pacing = self.pacing;
        UnboundedReceiverStream::new(rx)
            .take_while(|item| futures::future::ready(matches!(item, Outbound::View(_))))
            .filter_map(|item| async move {
                match item {
                    Outbound::View(view) => Some(view),
                    Outbound::Done => None,
                }
            })
            .then(move |view| async move {
                if !pacing.is_zero() {
                    tokio::time::sleep(pacing).await;
                }
                view
            })
            .boxed()
    }

    /// End the subscriber stream without stopping the conversation.
    pub async fn end_stream(&self, id: &ConversationId) {
        self.cache(id).await.enqueue(Outbound::Done);
    }

    /// Stop a conversation: later writes and publishes fail with
    /// [`MemoryError::ConversationClosed`], and the subscriber stream ends.
    ///
    /// The stop survives cache expiry and [`Self::reload`]; only
    /// [`Self::clear`] lifts it.
    pub async fn stop(&self, id: &ConversationId) {
        self.stopped.write().await.insert(id.clone());
        let cache = self.cache(id).await;
        cache.mark_stopped();
        cache.enqueue(Outbound::Done);
        info!(conversation_id = %id, "Conversation stopped");
    }
}

/// Start the task that applies one conversation's durable writes in order.
///
/// The task ends once the owning cache, and with it the sender, is dropped.
fn spawn_writer(store: Arc<dyn ConversationStore>, conversation_id: ConversationId) -> mpsc::UnboundedSender<PersistOp> {
    let (tx, mut rx) = mpsc::unbounded_channel::<PersistOp>();
    tokio::spawn(async move {
        while let Some(op) = rx.recv().await {
            let result = match &op {
                PersistOp::Message(message) => store.update_message(message).await,
                PersistOp::Plans(plans) => store.batch_save_plans(plans).await,
                PersistOp::PlanPatch { task_uid, patch } => {
                    store.update_plan_by_key(&conversation_id, task_uid, patch).await
                }
            };
            if let Err(e) = result {
                match op {
                    PersistOp::Message(message) => {
                        warn!(conversation_id = %conversation_id, message_id = %message.id, error = %e, "Failed to persist message");
                    }
                    PersistOp::Plans(plans) => {
                        warn!(conversation_id = %conversation_id, count = plans.len(), error = %e, "Failed to persist plans");
                    }
                    PersistOp::PlanPatch { task_uid, .. } => {
                        warn!(conversation_id = %conversation_id, task_uid = %task_uid, error = %e, "Failed to persist plan update");
                    }
                }
            }
        }
        debug!(conversation_id = %conversation_id, "Store writer finished");
    });
    tx
}
