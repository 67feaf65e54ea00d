//! Message domain types.
//!
//! These are the core value objects that flow through a conversation:
//! a user (or agent) sends a message → the turn engine thinks and acts →
//! a reply message is appended to the same conversation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message in a model prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The model
    Assistant,
    /// System instructions (profile, resources, rules)
    System,
}

/// A single prompt message sent to a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Name and role of a conversation participant.
///
/// Messages reference participants by value; the sender registry of a
/// conversation is keyed by `name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentRef {
    pub name: String,
    pub role: String,
}

impl AgentRef {
    pub fn new(name: impl Into<String>, role: impl Into<String>) -> Self {
        Self { name: name.into(), role: role.into() }
    }

    pub fn user() -> Self {
        Self::new("User", "Human")
    }
}

/// Outcome of executing one action for a message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionReport {
    /// Identifier of the action (see [`crate::action_id`]).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,

    pub success: bool,

    pub content: String,

    /// Opaque view payload produced by the resource, forwarded untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<serde_json::Value>,

    /// Whether a failed action may be attempted again.
    #[serde(default = "default_true")]
    pub retryable: bool,

    /// Whether a loop-mode turn should stop after this action.
    #[serde(default)]
    pub terminate: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_value: Option<serde_json::Value>,
}

fn default_true() -> bool {
    true
}

impl ActionReport {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            success: true,
            content: content.into(),
            retryable: true,
            ..Default::default()
        }
    }

    pub fn failed(content: impl Into<String>, retryable: bool) -> Self {
        Self {
            success: false,
            content: content.into(),
            retryable,
            ..Default::default()
        }
    }
}

/// Reviewer verdict attached to a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewInfo {
    pub approve: bool,
    #[serde(default)]
    pub comments: String,
}

/// A single message in a conversation.
///
/// Immutable once appended, except for the `success` flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    pub conversation_id: ConversationId,

    /// Position of the message in its conversation
    pub rounds: u64,

    pub sender: AgentRef,

    pub receiver: AgentRef,

    /// The text content
    pub content: String,

    /// Reasoning trace produced while thinking
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_report: Option<ActionReport>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_info: Option<ReviewInfo>,

    /// Which model produced this message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,

    pub success: bool,

    /// Hidden messages are spliced out of display views
    #[serde(default = "default_true")]
    pub visible: bool,

    /// Goal the sender was working on, shown alongside the message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_goal: Option<String>,

    /// Plan the message belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_uid: Option<String>,

    /// Resource metadata carried for display
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_info: Option<serde_json::Value>,

    /// Timestamp
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Create a new visible message with round 0.
    pub fn new(
        conversation_id: ConversationId,
        sender: AgentRef,
        receiver: AgentRef,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            conversation_id,
            rounds: 0,
            sender,
            receiver,
            content: content.into(),
            thinking: None,
            action_report: None,
            review_info: None,
            model_name: None,
            success: true,
            visible: true,
            current_goal: None,
            task_uid: None,
            resource_info: None,
            created_at: Utc::now(),
        }
    }

    /// Create a user message addressed to `receiver`.
    pub fn user(conversation_id: ConversationId, receiver: AgentRef, content: impl Into<String>) -> Self {
        Self::new(conversation_id, AgentRef::user(), receiver, content)
    }

    pub fn with_rounds(mut self, rounds: u64) -> Self {
        self.rounds = rounds;
        self
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.current_goal = Some(goal.into());
        self
    }

    pub fn with_task(mut self, task_uid: impl Into<String>) -> Self {
        self.task_uid = Some(task_uid.into());
        self
    }

    pub fn with_resource_info(mut self, info: serde_json::Value) -> Self {
        self.resource_info = Some(info);
        self
    }

    pub fn with_review(mut self, review: ReviewInfo) -> Self {
        self.review_info = Some(review);
        self
    }
}

/// Transient engine view of a message being produced.
///
/// Carries retry bookkeeping that never reaches persistence; converted into a
/// [`Message`] when the turn settles.
#[derive(Debug, Clone)]
pub struct AgentMessage {
    pub message: Message,

    /// Attempts made so far in the current turn.
    pub attempts: u32,

    /// Why the previous attempt was rejected.
    pub last_failure: Option<String>,
}

impl AgentMessage {
    pub fn new(message: Message) -> Self {
        Self { message, attempts: 0, last_failure: None }
    }

    pub fn into_message(self) -> Message {
        self.message
    }
}
