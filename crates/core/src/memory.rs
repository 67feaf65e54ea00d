//! Memory trait: per-agent fragments recorded after each attempt.
//!
//! Every think/act/verify iteration leaves a fragment behind: accepted
//! outputs and failure reasons. Recent fragments are fed back into the next
//! prompt, so a retry sees why the previous attempt was rejected.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::error::MemoryError;
use crate::message::ConversationId;

/// Whether a fragment records an accepted output or a rejected attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentKind {
    Accepted,
    Failure,
}

/// A single memory fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryFragment {
    /// Unique ID for this fragment
    pub id: String,

    pub conversation_id: ConversationId,

    /// Agent that produced the fragment
    pub agent: String,

    pub kind: FragmentKind,

    /// The content of the fragment
    pub content: String,

    /// When this fragment was created
    pub created_at: DateTime<Utc>,
}

impl MemoryFragment {
    pub fn new(
        conversation_id: ConversationId,
        agent: impl Into<String>,
        kind: FragmentKind,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            conversation_id,
            agent: agent.into(),
            kind,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// The core MemoryBackend trait.
///
/// Implementations bound their own size; what gets dropped when the budget is
/// exceeded is the backend's discard strategy.
#[async_trait]
pub trait MemoryBackend: Send + Sync {
    /// The backend name (e.g., "in_memory").
    fn name(&self) -> &str;

    /// Store a new fragment.
    async fn write(&self, fragment: MemoryFragment) -> std::result::Result<(), MemoryError>;

    /// The most recent `limit` fragments of `agent` in a conversation, oldest first.
    async fn read(
        &self,
        conversation_id: &ConversationId,
        agent: &str,
        limit: usize,
    ) -> std::result::Result<Vec<MemoryFragment>, MemoryError>;

    /// Get total fragment count.
    async fn count(&self) -> std::result::Result<usize, MemoryError>;

    /// Clear all fragments.
    async fn clear(&self) -> std::result::Result<(), MemoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragment_serialization() {
        let fragment = MemoryFragment::new(
            ConversationId::from("c1"),
            "solver",
            FragmentKind::Failure,
            "output was empty",
        );
        let json = serde_json::to_string(&fragment).unwrap();
        assert!(json.contains("\"failure\""));
        assert!(json.contains("output was empty"));
    }
}
