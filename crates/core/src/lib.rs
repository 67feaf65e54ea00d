//! # agentweave Core
//!
//! Domain types, collaborator traits, and error definitions for the agentweave
//! orchestration core. This crate has **no runtime machinery** of its own: it
//! defines the model that the memory engine, tool client, providers and the
//! turn engine are written against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (model serving, persistence, visualization,
//! resources, memory fragments) is a trait here. Implementations live in their
//! respective crates, which keeps the dependency graph pointing inward and lets
//! tests swap in scripted stand-ins.

pub mod error;
pub mod message;
pub mod plan;
pub mod action_id;
pub mod provider;
pub mod tool;
pub mod memory;
pub mod persistence;
pub mod visualizer;
pub mod resource;
pub mod agent;
pub mod event;
pub mod trace;

// Re-export key types at crate root for ergonomics
pub use error::{Error, MemoryError, ProviderError, Result, ToolError};
pub use message::{ActionReport, AgentMessage, AgentRef, ChatMessage, ConversationId, Message, ReviewInfo, Role};
pub use plan::{ActionKind, Plan, PlanPatch, PlanState};
pub use provider::{Provider, ProviderRequest, StreamChunk};
pub use tool::{ToolCall, ToolDefinition, ToolResult};
pub use memory::{MemoryBackend, MemoryFragment, FragmentKind};
pub use persistence::ConversationStore;
pub use visualizer::{StreamDelta, Visualizer};
pub use resource::{ActionContext, ActionRequest, Resource};
pub use agent::{AgentProfile, AgentSpec};
pub use event::{DomainEvent, EventBus};
pub use trace::TraceContext;
