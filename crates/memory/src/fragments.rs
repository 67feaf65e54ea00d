//! Bounded in-memory store for agent memory fragments.
//!
//! Fragments are kept per (conversation, agent) and each of those windows is
//! bounded on its own, so a busy conversation never evicts another's. When a
//! write pushes a window past its capacity, the [`DiscardStrategy`] picks
//! what goes:
//!
//! - `Fifo` drops the oldest fragment.
//! - `Similarity` drops the fragment least similar to the one just written,
//!   measured as Jaccard overlap of lower-cased word sets. The reference point
//!   slides with every write; ties go to the oldest fragment.

use std::collections::{HashMap, HashSet, VecDeque};
use std::str::FromStr;

use agentweave_core::error::MemoryError;
use agentweave_core::memory::{MemoryBackend, MemoryFragment};
use agentweave_core::message::ConversationId;
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DiscardStrategy {
    #[default]
    Fifo,
    Similarity,
}

impl FromStr for DiscardStrategy {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fifo" => Ok(Self::Fifo),
            "similarity" => Ok(Self::Similarity),
            other => Err(MemoryError::Storage(format!("unknown discard strategy: {other}"))),
        }
    }
}

type WindowKey = (ConversationId, String);

pub struct InMemoryFragmentStore {
    windows: RwLock<HashMap<WindowKey, VecDeque<MemoryFragment>>>,
    /// Bound of each (conversation, agent) window
    capacity: usize,
    strategy: DiscardStrategy,
}

impl InMemoryFragmentStore {
    pub fn new(capacity: usize, strategy: DiscardStrategy) -> Self {
        Self {
            windows: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            strategy,
        }
    }
}

impl Default for InMemoryFragmentStore {
    fn default() -> Self {
        Self::new(256, DiscardStrategy::Fifo)
    }
}

fn words(text: &str) -> HashSet<String> {
    text.split_whitespace().map(|w| w.to_lowercase()).collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let shared = a.intersection(b).count() as f32;
    let total = a.union(b).count() as f32;
    shared / total
}

/// Index of the fragment to drop; the newest fragment (last) is never chosen.
fn pick_victim(fragments: &VecDeque<MemoryFragment>, strategy: DiscardStrategy) -> usize {
    match strategy {
        DiscardStrategy::Fifo => 0,
        DiscardStrategy::Similarity => {
            let Some(latest) = fragments.back() else {
                return 0;
            };
            let reference = words(&latest.content);
            let mut victim = 0;
            let mut lowest = f32::MAX;
            for (i, fragment) in fragments.iter().enumerate().take(fragments.len() - 1) {
                let score = jaccard(&reference, &words(&fragment.content));
                if score < lowest {
                    lowest = score;
                    victim = i;
                }
            }
            victim
        }
    }
}

#[async_trait]
impl MemoryBackend for InMemoryFragmentStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn write(&self, fragment: MemoryFragment) -> Result<(), MemoryError> {
        let key = (fragment.conversation_id.clone(), fragment.agent.clone());
        let mut windows = self.windows.write().await;
        let fragments = windows.entry(key).or_default();
        fragments.push_back(fragment);
        while fragments.len() > self.capacity {
            let victim = pick_victim(fragments, self.strategy);
            if let Some(dropped) = fragments.remove(victim) {
                debug!(fragment_id = %dropped.id, strategy = ?self.strategy, "Discarded memory fragment");
            }
        }
        Ok(())
    }

    async fn read(
        &self,
        conversation_id: &ConversationId,
        agent: &str,
        limit: usize,
    ) -> Result<Vec<MemoryFragment>, MemoryError> {
        let windows = self.windows.read().await;
        let key = (conversation_id.clone(), agent.to_string());
        let Some(fragments) = windows.get(&key) else {
            return Ok(Vec::new());
        };
        let skip = fragments.len().saturating_sub(limit);
        Ok(fragments.iter().skip(skip).cloned().collect())
    }

    async fn count(&self) -> Result<usize, MemoryError> {
        Ok(self.windows.read().await.values().map(VecDeque::len).sum())
    }

    async fn clear(&self) -> Result<(), MemoryError> {
        self.windows.write().await.clear();
        Ok(())
    }
}
