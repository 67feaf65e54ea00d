//! Error types for the agentweave domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all agentweave operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Memory errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Errors raised by a model-serving backend.
///
/// Every variant maps to an application code through [`ProviderError::code`].
/// A positive code means the request may be retried against another model;
/// zero or negative codes are fatal for the current turn.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (code: {code})")]
    ApiError { code: i32, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl ProviderError {
    /// Application code for this error.
    pub fn code(&self) -> i32 {
        match self {
            Self::ApiError { code, .. } => *code,
            Self::RateLimited { .. } => 429,
            Self::ModelNotFound(_) => 404,
            Self::StreamInterrupted(_) => 502,
            Self::Timeout(_) => 504,
            Self::Network(_) => 503,
            Self::NotConfigured(_) => 0,
            Self::AuthenticationFailed(_) => -401,
        }
    }

    /// Whether another model may be tried after this error.
    pub fn is_retryable(&self) -> bool {
        self.code() > 0
    }
}

#[derive(Debug, Clone, Error)]
pub enum MemoryError {
    /// The conversation was stopped; further writes are rejected.
    #[error("Conversation closed: {0}")]
    ConversationClosed(String),

    #[error("Plan not found: {0}")]
    PlanNotFound(String),

    #[error("Invalid plan transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Storage error: {0}")]
    Storage(String),
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    /// The call did not complete within its deadline.
    #[error("Tool timed out: {tool_name} after {timeout_ms}ms")]
    Timeout { tool_name: String, timeout_ms: u64 },

    /// The remote tool answered with an application error.
    #[error("Tool {tool_name} failed remotely: {message}")]
    Remote { tool_name: String, message: String },

    /// The request never produced a well-formed answer (connection, HTTP, decoding).
    #[error("Tool transport error: {0}")]
    Transport(String),

    #[error("Permission denied: {tool_name}: {reason}")]
    PermissionDenied { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn provider_codes_split_retryable_from_fatal() {
        assert!(ProviderError::RateLimited { retry_after_secs: 1 }.is_retryable());
        assert!(ProviderError::Network("reset".into()).is_retryable());
        assert!(ProviderError::ModelNotFound("gpt-x".into()).is_retryable());
        assert!(!ProviderError::AuthenticationFailed("bad key".into()).is_retryable());
        assert!(!ProviderError::NotConfigured("none".into()).is_retryable());
        assert!(!ProviderError::ApiError { code: 0, message: "x".into() }.is_retryable());
        assert!(!ProviderError::ApiError { code: -3, message: "x".into() }.is_retryable());
    }

    #[test]
    fn tool_timeout_is_distinct_from_remote_failure() {
        let timeout = ToolError::Timeout { tool_name: "search".into(), timeout_ms: 500 };
        let remote = ToolError::Remote { tool_name: "search".into(), message: "boom".into() };
        assert!(timeout.to_string().contains("500ms"));
        assert!(remote.to_string().contains("boom"));
        assert!(!matches!(remote, ToolError::Timeout { .. }));
    }

    #[test]
    fn memory_error_converts_into_top_level() {
        let err: Error = MemoryError::ConversationClosed("c1".into()).into();
        assert!(matches!(err, Error::Memory(MemoryError::ConversationClosed(_))));
        assert!(err.to_string().contains("c1"));
    }
}
