//! Conversation memory for agentweave.
//!
//! - [`ConversationMemoryEngine`]: TTL-scoped conversation caches, views and
//!   fire-and-forget persistence.
//! - [`PlanStore`]: the per-conversation plan table.
//! - [`InMemoryFragmentStore`]: bounded agent memory fragments.
//! - Conversation stores for tests and ephemeral hosts.

pub mod plan_store;
pub mod cache;
pub mod display;
pub mod engine;
pub mod in_memory;
pub mod noop;
pub mod fragments;
pub mod visualizer;

pub use plan_store::PlanStore;
pub use cache::ConversationCache;
pub use display::merge_for_display;
pub use engine::{ConversationHistory, ConversationMemoryEngine};
pub use in_memory::InMemoryConversationStore;
pub use noop::NoopConversationStore;
pub use fragments::{DiscardStrategy, InMemoryFragmentStore};
pub use visualizer::PassthroughVisualizer;
