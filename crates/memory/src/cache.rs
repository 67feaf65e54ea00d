//! Conversation cache: all live state of one conversation.
//!
//! The cache is the isolation unit: nothing in it is shared with another
//! conversation. Message log, plan table and sender registry sit behind one
//! `RwLock`; the round counter and the stopped flag are atomics so they can
//! be read without taking the lock. Durable writes leave through a single
//! writer queue so the store sees them in issue order.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use agentweave_core::message::{AgentRef, ConversationId, Message};
use agentweave_core::plan::{Plan, PlanPatch};
use agentweave_core::visualizer::Visualizer;
use tokio::sync::{RwLock, mpsc};
use tokio::time::Instant;

use crate::plan_store::PlanStore;

/// An item on the outbound queue.
#[derive(Debug, Clone)]
pub(crate) enum Outbound {
    View(serde_json::Value),
    /// End of stream; the subscriber stops here.
    Done,
}

/// A durable write waiting for the conversation's store writer.
#[derive(Debug, Clone)]
pub(crate) enum PersistOp {
    Message(Message),
    Plans(Vec<Plan>),
    PlanPatch { task_uid: String, patch: PlanPatch },
}

#[derive(Default)]
pub(crate) struct CacheState {
    /// Message ids in insertion order
    pub order: Vec<String>,
    pub messages: HashMap<String, Message>,
    pub plans: PlanStore,
    pub senders: BTreeMap<String, AgentRef>,
}

impl CacheState {
    /// Messages sorted by round; insertion order breaks ties.
    pub fn ordered_messages(&self) -> Vec<Message> {
        let mut messages: Vec<Message> = self
            .order
            .iter()
            .filter_map(|id| self.messages.get(id).cloned())
            .collect();
        messages.sort_by_key(|m| m.rounds);
        messages
    }

    pub fn insert_message(&mut self, message: Message) {
        if !self.messages.contains_key(&message.id) {
            self.order.push(message.id.clone());
        }
        self.messages.insert(message.id.clone(), message);
    }
}

pub struct ConversationCache {
    id: ConversationId,
    pub(crate) state: RwLock<CacheState>,
    round: AtomicU64,
    stopped: AtomicBool,
    last_access: Mutex<Instant>,
    outbound_tx: Mutex<mpsc::UnboundedSender<Outbound>>,
    outbound_rx: Mutex<Option<mpsc::UnboundedReceiver<Outbound>>>,
    /// Set on the first durable write; the writer task ends with the cache.
    writer: OnceLock<mpsc::UnboundedSender<PersistOp>>,
    visualizer: Option<Arc<dyn Visualizer>>,
}

impl ConversationCache {
    pub(crate) fn new(id: ConversationId, visualizer: Option<Arc<dyn Visualizer>>, start_round: u64) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            id,
            state: RwLock::new(CacheState::default()),
            round: AtomicU64::new(start_round),
            stopped: AtomicBool::new(false),
            last_access: Mutex::new(Instant::now()),
            outbound_tx: Mutex::new(tx),
            outbound_rx: Mutex::new(Some(rx)),
            writer: OnceLock::new(),
            visualizer,
        }
    }

    pub fn id(&self) -> &ConversationId {
        &self.id
    }

    pub(crate) fn visualizer(&self) -> Option<&Arc<dyn Visualizer>> {
        self.visualizer.as_ref()
    }

    /// Allocate the next round number.
    pub fn next_round(&self) -> u64 {
        self.round.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn current_round(&self) -> u64 {
        self.round.load(Ordering::SeqCst)
    }

    /// Make sure future rounds come after `rounds`.
    pub(crate) fn observe_round(&self, rounds: u64) {
        self.round.fetch_max(rounds, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_stopped(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub(crate) fn touch(&self) {
        if let Ok(mut last) = self.last_access.lock() {
            *last = Instant::now();
        }
    }

    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.last_access
            .lock()
            .map(|last| last.elapsed() > ttl)
            .unwrap_or(false)
    }

    /// Enqueue an item for the subscriber. Returns false if nobody can receive it.
    pub(crate) fn enqueue(&self, item: Outbound) -> bool {
        match self.outbound_tx.lock() {
            Ok(tx) => tx.send(item).is_ok(),
            Err(_) => false,
        }
    }

    /// Queue a durable write, starting the writer with `spawn` on first use.
    ///
    /// Returns false if the writer has gone away.
    pub(crate) fn persist(
        &self,
        op: PersistOp,
        spawn: impl FnOnce() -> mpsc::UnboundedSender<PersistOp>,
    ) -> bool {
        self.writer.get_or_init(spawn).send(op).is_ok()
    }

    /// Hand out the receiving end of the outbound queue.
    ///
    /// The first caller receives everything queued so far. Later callers get
    /// a fresh queue, which ends the previous subscriber's stream.
    pub(crate) fn take_receiver(&self) -> mpsc::UnboundedReceiver<Outbound> {
        if let Some(rx) = self.outbound_rx.lock().ok().and_then(|mut slot| slot.take()) {
            return rx;
        }
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut current) = self.outbound_tx.lock() {
            *current = tx;
        }
        rx
    }
}
