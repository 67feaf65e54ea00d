//! Plan records and their lifecycle.
//!
//! A plan is a scheduled unit of work identified by a hierarchical task uid
//! (see [`crate::action_id`]). Plans reference their parent by id only, so a
//! plan table stays a flat, serializable map.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::message::ConversationId;

/// Lifecycle state of a plan.
///
/// `Todo → Running → (Retrying → Running)* → (Complete | Failed)`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanState {
    #[default]
    Todo,
    Running,
    Retrying,
    Complete,
    Failed,
}

impl PlanState {
    /// Whether moving from `self` to `next` respects the lifecycle.
    ///
    /// Staying in the same state is always allowed and treated as a no-op.
    pub fn can_transition_to(self, next: PlanState) -> bool {
        use PlanState::*;
        self == next
            || matches!(
                (self, next),
                (Todo, Running)
                    | (Running, Retrying)
                    | (Running, Complete)
                    | (Running, Failed)
                    | (Retrying, Running)
            )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PlanState::Complete | PlanState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlanState::Todo => "TODO",
            PlanState::Running => "RUNNING",
            PlanState::Retrying => "RETRYING",
            PlanState::Complete => "COMPLETE",
            PlanState::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for PlanState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of resource carries out a plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    #[default]
    Agent,
    Tool,
    Knowledge,
}

/// A scheduled unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Unique hierarchical id (`1`, `1-2`, `1-2.3`)
    pub task_uid: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_task_id: Option<String>,

    pub conversation_id: ConversationId,

    /// Round of the message that produced this plan
    pub rounds: u64,

    /// Groups the plans emitted together by one planning step
    pub round_id: String,

    pub title: String,

    #[serde(default)]
    pub description: String,

    pub assigned_agent: String,

    #[serde(default)]
    pub action_kind: ActionKind,

    #[serde(default)]
    pub state: PlanState,

    #[serde(default)]
    pub retry_count: u32,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    pub planner_agent: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planner_model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

fn default_max_retries() -> u32 {
    3
}

impl Plan {
    /// Create a `Todo` plan.
    pub fn new(
        conversation_id: ConversationId,
        task_uid: impl Into<String>,
        title: impl Into<String>,
        assigned_agent: impl Into<String>,
        planner_agent: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            task_uid: task_uid.into(),
            parent_task_id: None,
            conversation_id,
            rounds: 0,
            round_id: String::new(),
            title: title.into(),
            description: String::new(),
            assigned_agent: assigned_agent.into(),
            action_kind: ActionKind::Agent,
            state: PlanState::Todo,
            retry_count: 0,
            max_retries: default_max_retries(),
            planner_agent: planner_agent.into(),
            planner_model: None,
            result: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent_task_id = Some(parent.into());
        self
    }

    pub fn with_round(mut self, rounds: u64, round_id: impl Into<String>) -> Self {
        self.rounds = rounds;
        self.round_id = round_id.into();
        self
    }

    pub fn with_kind(mut self, kind: ActionKind) -> Self {
        self.action_kind = kind;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Apply a partial update.
    pub fn apply(&mut self, patch: &PlanPatch) {
        self.state = patch.state;
        self.retry_count = patch.retry_count;
        if let Some(model) = &patch.model {
            self.planner_model = Some(model.clone());
        }
        if let Some(result) = &patch.result {
            self.result = Some(result.clone());
        }
        self.updated_at = Utc::now();
    }
}

/// Partial update applied to a plan by task uid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanPatch {
    pub state: PlanState,
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

impl PlanPatch {
    pub fn state(state: PlanState, retry_count: u32) -> Self {
        Self { state, retry_count, model: None, result: None }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_result(mut self, result: impl Into<String>) -> Self {
        self.result = Some(result.into());
        self
    }
}
