//! Resource trait: capabilities an agent can act through.
//!
//! A parsed action is a closed set of requests; each is routed to the
//! resource bound for its [`ActionKind`]. Resources never fail with an
//! error: whatever happens is folded into the returned [`ActionReport`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::message::{ActionReport, AgentRef, ConversationId};
use crate::plan::ActionKind;
use crate::trace::TraceContext;

/// A single action parsed from a model reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionRequest {
    /// Invoke a remote tool.
    Tool {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        group: Option<String>,
        name: String,
        #[serde(default)]
        arguments: serde_json::Value,
    },

    /// Hand the task to another agent.
    AgentDelegation { agent: String, content: String },

    /// Query a knowledge source.
    Knowledge { query: String },
}

impl ActionRequest {
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionRequest::Tool { .. } => ActionKind::Tool,
            ActionRequest::AgentDelegation { .. } => ActionKind::Agent,
            ActionRequest::Knowledge { .. } => ActionKind::Knowledge,
        }
    }
}

/// Everything a resource may need to know about the acting turn.
#[derive(Debug, Clone)]
pub struct ActionContext {
    pub conversation_id: ConversationId,

    /// The agent performing the action
    pub sender: AgentRef,

    /// Round of the message being answered
    pub rounds: u64,

    /// Output of the previous action in a chain
    pub previous_output: Option<String>,

    pub trace: TraceContext,
}

#[async_trait]
pub trait Resource: Send + Sync {
    /// Name shown to the model in the system prompt.
    fn name(&self) -> &str;

    /// Which actions this resource serves.
    fn kind(&self) -> ActionKind;

    /// One-line description rendered into prompts.
    ///
    /// Called whenever a prompt is built; resources backed by remote
    /// metadata may look it up here.
    async fn describe(&self) -> String {
        format!("{} ({:?})", self.name(), self.kind())
    }

    async fn execute(&self, request: &ActionRequest, ctx: &ActionContext) -> ActionReport;
}
