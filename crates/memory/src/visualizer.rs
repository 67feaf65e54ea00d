//! Default visualizer: hands the data model through as JSON.

use agentweave_core::message::{AgentRef, Message};
use agentweave_core::plan::Plan;
use agentweave_core::visualizer::{StreamDelta, Visualizer};
use serde_json::json;

pub struct PassthroughVisualizer;

impl Visualizer for PassthroughVisualizer {
    fn render_final(&self, messages: &[Message], plans: &[Plan], senders: &[AgentRef]) -> serde_json::Value {
        json!({
            "type": "final",
            "messages": messages,
            "plans": plans,
            "senders": senders,
        })
    }

    fn render_delta(&self, delta: &StreamDelta) -> serde_json::Value {
        json!({
            "type": "delta",
            "delta": delta,
        })
    }
}
