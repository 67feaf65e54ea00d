//! The agent turn engine: how one agent answers one message.
//!
//! Every turn follows a **Think → Act → Verify** cycle:
//!
//! 1. **Think**: render the prompts and stream a model reply, falling back to
//!    another model on retryable provider errors
//! 2. **Act**: run the actions the reply asks for (tool calls, delegation to
//!    another agent, knowledge lookups); plain text passes through
//! 3. **Verify**: reject empty output, failed actions and reviewer
//!    disapproval, then ask the pluggable [`Verifier`]
//!
//! A rejected attempt is fed back into the next one until the retry budget
//! runs out. The [`Host`] wires agents to shared memory, resources and each
//! other.

pub mod action;
pub mod host;
pub mod prompt;
pub mod turn;
pub mod verify;

#[cfg(test)]
mod test_helpers;

pub use action::{parse_actions, parse_review};
pub use host::{DelegationResource, Host};
pub use prompt::PromptBuilder;
pub use turn::{AgentTurnEngine, TurnSettings, TurnState};
pub use verify::{AcceptAll, Verdict, Verifier};
