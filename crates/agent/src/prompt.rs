//! Prompt rendering for one think step.

use agentweave_core::agent::AgentSpec;
use agentweave_core::memory::{FragmentKind, MemoryFragment};
use agentweave_core::message::{ChatMessage, Message};

const ACTION_GUIDE: &str = "To act through a resource, reply with a single JSON object:\n\
{\"tool\": \"<name>\", \"group\": \"<group>\", \"arguments\": {...}}\n\
{\"agent\": \"<name>\", \"content\": \"<task>\"}\n\
{\"knowledge\": \"<query>\"}\n\
or a JSON array of them to chain actions, each receiving the previous output. \
Otherwise reply with the answer only.";

/// Builds the system and user prompts of an agent.
pub struct PromptBuilder<'a> {
    spec: &'a AgentSpec,
    resources: Vec<String>,
    fragments: &'a [MemoryFragment],
    steps: &'a [String],
    last_failure: Option<&'a str>,
}

impl<'a> PromptBuilder<'a> {
    pub fn new(spec: &'a AgentSpec) -> Self {
        Self {
            spec,
            resources: Vec::new(),
            fragments: &[],
            steps: &[],
            last_failure: None,
        }
    }

    /// One-line descriptions of the bound resources.
    pub fn with_resources(mut self, resources: Vec<String>) -> Self {
        self.resources = resources;
        self
    }

    pub fn with_fragments(mut self, fragments: &'a [MemoryFragment]) -> Self {
        self.fragments = fragments;
        self
    }

    /// Outputs of earlier accepted steps in loop mode.
    pub fn with_steps(mut self, steps: &'a [String]) -> Self {
        self.steps = steps;
        self
    }

    /// Why the previous attempt was rejected.
    pub fn with_last_failure(mut self, reason: Option<&'a str>) -> Self {
        self.last_failure = reason;
        self
    }

    pub fn system_prompt(&self) -> String {
        let spec = self.spec;
        let mut prompt = format!("You are {}, a {}.\nGoal: {}\n", spec.name, spec.role, spec.goal);
        if !spec.description.is_empty() {
            prompt.push_str(&format!("\n{}\n", spec.description));
        }

        if !spec.constraints.is_empty() {
            prompt.push_str("\n## Constraints\n");
            for constraint in &spec.constraints {
                prompt.push_str(&format!("- {constraint}\n"));
            }
        }

        if !self.resources.is_empty() {
            prompt.push_str("\n## Resources\n");
            for resource in &self.resources {
                prompt.push_str(&format!("- {resource}\n"));
            }
            prompt.push('\n');
            prompt.push_str(ACTION_GUIDE);
            prompt.push('\n');
        }

        if !self.fragments.is_empty() {
            prompt.push_str("\n## Memory\n");
            for fragment in self.fragments {
                let label = match fragment.kind {
                    FragmentKind::Accepted => "accepted",
                    FragmentKind::Failure => "rejected",
                };
                prompt.push_str(&format!("- [{label}] {}\n", fragment.content));
            }
        }
        prompt
    }

    pub fn user_prompt(&self, received: &Message) -> String {
        let mut prompt = received.content.clone();

        if !self.steps.is_empty() {
            prompt.push_str("\n\n## Completed steps\n");
            for (i, step) in self.steps.iter().enumerate() {
                prompt.push_str(&format!("{}. {}\n", i + 1, step));
            }
            prompt.push_str("Continue with the next step.");
        }

        if let Some(reason) = self.last_failure {
            prompt.push_str(&format!(
                "\n\nYour previous attempt was rejected: {reason}\nFix the problem and try again."
            ));
        }
        prompt
    }

    pub fn build(&self, received: &Message) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(self.system_prompt()),
            ChatMessage::user(self.user_prompt(received)),
        ]
    }
}
