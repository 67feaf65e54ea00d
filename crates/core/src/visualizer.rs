//! Visualization collaborator.
//!
//! The core never interprets view payloads; it renders them through this
//! trait and forwards the resulting JSON to subscribers.

use serde::{Deserialize, Serialize};
use crate::message::{AgentRef, Message};
use crate::plan::Plan;

/// An incremental update produced while a turn is still streaming.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDelta {
    /// Message id the delta belongs to
    pub message_id: String,

    pub rounds: u64,

    pub sender: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

pub trait Visualizer: Send + Sync {
    /// Render a complete view of the conversation.
    fn render_final(&self, messages: &[Message], plans: &[Plan], senders: &[AgentRef]) -> serde_json::Value;

    /// Render one streamed delta.
    fn render_delta(&self, delta: &StreamDelta) -> serde_json::Value;
}
