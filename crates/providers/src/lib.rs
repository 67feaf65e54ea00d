//! LLM provider implementations for agentweave.
//!
//! All providers implement the `agentweave_core::Provider` trait.
//! The router builds the configured provider and its model fallback chain.

pub mod fallback;
pub mod openai_compat;
pub mod router;

pub use fallback::ModelFallback;
pub use openai_compat::OpenAiCompatProvider;
pub use router::build_from_config;
