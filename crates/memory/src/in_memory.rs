//! In-memory conversation store: useful for testing and ephemeral hosts.

use std::collections::HashMap;
use std::sync::Arc;

use agentweave_core::error::MemoryError;
use agentweave_core::message::{ConversationId, Message};
use agentweave_core::persistence::ConversationStore;
use agentweave_core::plan::{Plan, PlanPatch};
use async_trait::async_trait;
use tokio::sync::RwLock;

/// Stores messages and plans in maps keyed by conversation.
/// Useful for testing and sessions where durability isn't needed.
pub struct InMemoryConversationStore {
    messages: Arc<RwLock<HashMap<ConversationId, Vec<Message>>>>,
    plans: Arc<RwLock<HashMap<ConversationId, Vec<Plan>>>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self {
            messages: Arc::new(RwLock::new(HashMap::new())),
            plans: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn get_messages(&self, conversation_id: &ConversationId) -> Result<Vec<Message>, MemoryError> {
        let mut messages = self
            .messages
            .read()
            .await
            .get(conversation_id)
            .cloned()
            .unwrap_or_default();
        messages.sort_by_key(|m| m.rounds);
        Ok(messages)
    }

    async fn update_message(&self, message: &Message) -> Result<(), MemoryError> {
        let mut messages = self.messages.write().await;
        let rows = messages.entry(message.conversation_id.clone()).or_default();
        match rows.iter_mut().find(|m| m.id == message.id) {
            Some(existing) => *existing = message.clone(),
            None => rows.push(message.clone()),
        }
        Ok(())
    }

    async fn get_plans(&self, conversation_id: &ConversationId) -> Result<Vec<Plan>, MemoryError> {
        Ok(self
            .plans
            .read()
            .await
            .get(conversation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn batch_save_plans(&self, plans: &[Plan]) -> Result<(), MemoryError> {
        let mut tables = self.plans.write().await;
        for plan in plans {
            let rows = tables.entry(plan.conversation_id.clone()).or_default();
            match rows.iter_mut().find(|p| p.task_uid == plan.task_uid) {
                Some(existing) => *existing = plan.clone(),
                None => rows.push(plan.clone()),
            }
        }
        Ok(())
    }

    async fn update_plan_by_key(
        &self,
        conversation_id: &ConversationId,
        task_uid: &str,
        patch: &PlanPatch,
    ) -> Result<(), MemoryError> {
        let mut tables = self.plans.write().await;
        let plan = tables
            .get_mut(conversation_id)
            .and_then(|rows| rows.iter_mut().find(|p| p.task_uid == task_uid))
            .ok_or_else(|| MemoryError::PlanNotFound(task_uid.to_string()))?;
        plan.apply(patch);
        Ok(())
    }
}
