//! Agent profiles and the specs materialized from them.
//!
//! A profile is an immutable template shared by every agent built from it.
//! `materialize` renders the `{name}` and `{role}` placeholders for one agent
//! and returns an owned [`AgentSpec`], so no agent can mutate another's view
//! of the template.

use serde::{Deserialize, Serialize};
use crate::message::AgentRef;

/// Template describing a kind of agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub role: String,

    /// What the agent tries to achieve; may contain placeholders
    pub goal: String,

    #[serde(default)]
    pub description: String,

    /// Rules rendered into the system prompt
    #[serde(default)]
    pub constraints: Vec<String>,

    /// Preferred model; falls back to the host default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Silent agents hand work off without showing up in display views
    #[serde(default)]
    pub silent: bool,
}

impl AgentProfile {
    pub fn new(role: impl Into<String>, goal: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            goal: goal.into(),
            description: String::new(),
            constraints: Vec::new(),
            model: None,
            silent: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraints.push(constraint.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    /// Build the spec of the agent called `name`.
    pub fn materialize(&self, name: &str) -> AgentSpec {
        let render = |text: &str| text.replace("{name}", name).replace("{role}", &self.role);
        AgentSpec {
            name: name.to_string(),
            role: self.role.clone(),
            goal: render(&self.goal),
            description: render(&self.description),
            constraints: self.constraints.iter().map(|c| render(c)).collect(),
            model: self.model.clone(),
            visible: !self.silent,
        }
    }
}

/// A concrete agent, owned by the engine that runs it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub name: String,
    pub role: String,
    pub goal: String,
    pub description: String,
    pub constraints: Vec<String>,
    pub model: Option<String>,
    /// Whether replies of this agent are shown in display views
    pub visible: bool,
}

impl AgentSpec {
    pub fn agent_ref(&self) -> AgentRef {
        AgentRef::new(self.name.clone(), self.role.clone())
    }
}
