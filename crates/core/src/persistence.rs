//! Persistence collaborator for conversations.
//!
//! The memory engine keeps live state in memory and forwards durable writes
//! here from one writer task per conversation, in the order they were made.
//! Nothing on the turn path awaits these calls except an explicit reload.

use async_trait::async_trait;
use crate::error::MemoryError;
use crate::message::{ConversationId, Message};
use crate::plan::{Plan, PlanPatch};

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// The backend name (e.g., "in_memory", "none").
    fn name(&self) -> &str;

    /// All persisted messages of a conversation, in round order.
    async fn get_messages(&self, conversation_id: &ConversationId) -> Result<Vec<Message>, MemoryError>;

    /// Insert or replace a message by id.
    async fn update_message(&self, message: &Message) -> Result<(), MemoryError>;

    /// All persisted plans of a conversation.
    async fn get_plans(&self, conversation_id: &ConversationId) -> Result<Vec<Plan>, MemoryError>;

    /// Insert or replace plans by task uid.
    async fn batch_save_plans(&self, plans: &[Plan]) -> Result<(), MemoryError>;

    /// Apply a partial update to one plan.
    async fn update_plan_by_key(
        &self,
        conversation_id: &ConversationId,
        task_uid: &str,
        patch: &PlanPatch,
    ) -> Result<(), MemoryError>;
}
