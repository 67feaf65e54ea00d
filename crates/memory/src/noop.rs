//! No-op conversation store: disables durable writes entirely.

use agentweave_core::error::MemoryError;
use agentweave_core::message::{ConversationId, Message};
use agentweave_core::persistence::ConversationStore;
use agentweave_core::plan::{Plan, PlanPatch};
use async_trait::async_trait;

/// A no-op store that persists nothing and reloads nothing.
pub struct NoopConversationStore;

#[async_trait]
impl ConversationStore for NoopConversationStore {
    fn name(&self) -> &str {
        "none"
    }

    async fn get_messages(&self, _conversation_id: &ConversationId) -> Result<Vec<Message>, MemoryError> {
        Ok(Vec::new())
    }

    async fn update_message(&self, _message: &Message) -> Result<(), MemoryError> {
        Ok(())
    }

    async fn get_plans(&self, _conversation_id: &ConversationId) -> Result<Vec<Plan>, MemoryError> {
        Ok(Vec::new())
    }

    async fn batch_save_plans(&self, _plans: &[Plan]) -> Result<(), MemoryError> {
        Ok(())
    }

    async fn update_plan_by_key(
        &self,
        _conversation_id: &ConversationId,
        _task_uid: &str,
        _patch: &PlanPatch,
    ) -> Result<(), MemoryError> {
        Ok(())
    }
}
