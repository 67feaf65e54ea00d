//! Configuration loading, validation, and management for agentweave.
//!
//! Loads configuration from `~/.agentweave/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.agentweave/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the model provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default model provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Base URL of an OpenAI-compatible endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Models tried, in order, when the current one fails retryably
    #[serde(default)]
    pub fallback_models: Vec<String>,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Conversation memory configuration
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Turn engine configuration
    #[serde(default)]
    pub agent: AgentConfig,

    /// Remote tool configuration
    #[serde(default)]
    pub tools: ToolsConfig,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .field("fallback_models", &self.fallback_models)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("memory", &self.memory)
            .field("agent", &self.agent)
            .field("tools", &self.tools)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Idle time after which a conversation cache is evicted
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// How often the background sweeper looks for idle caches
    #[serde(default = "default_janitor_interval_secs")]
    pub janitor_interval_secs: u64,

    /// Number of most recent messages considered by the display merge
    #[serde(default = "default_max_chat_round")]
    pub max_chat_round: usize,

    /// Delay between streamed views delivered to a subscriber
    #[serde(default = "default_stream_pacing_ms")]
    pub stream_pacing_ms: u64,

    /// Maximum memory fragments kept per conversation and agent before discarding
    #[serde(default = "default_fragment_capacity")]
    pub fragment_capacity: usize,

    /// "fifo" or "similarity"
    #[serde(default = "default_discard_strategy")]
    pub discard_strategy: String,
}

fn default_cache_ttl_secs() -> u64 {
    3600
}
fn default_janitor_interval_secs() -> u64 {
    60
}
fn default_max_chat_round() -> usize {
    50
}
fn default_stream_pacing_ms() -> u64 {
    10
}
fn default_fragment_capacity() -> usize {
    256
}
fn default_discard_strategy() -> String {
    "fifo".into()
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl_secs(),
            janitor_interval_secs: default_janitor_interval_secs(),
            max_chat_round: default_max_chat_round(),
            stream_pacing_ms: default_stream_pacing_ms(),
            fragment_capacity: default_fragment_capacity(),
            discard_strategy: default_discard_strategy(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Attempts per turn before giving up
    #[serde(default = "default_max_retry_count")]
    pub max_retry_count: u32,

    /// Keep iterating after a success until an action asks to terminate
    #[serde(default)]
    pub loop_mode: bool,

    /// Iteration cap for loop mode
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,

    /// Model selections tried per think step before the error is fatal
    #[serde(default = "default_model_selection_attempts")]
    pub model_selection_attempts: u32,

    /// Memory fragments rendered into the system prompt
    #[serde(default = "default_memory_window")]
    pub memory_window: usize,
}

fn default_max_retry_count() -> u32 {
    3
}
fn default_max_rounds() -> u32 {
    20
}
fn default_model_selection_attempts() -> u32 {
    3
}
fn default_memory_window() -> usize {
    5
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_retry_count: default_max_retry_count(),
            loop_mode: false,
            max_rounds: default_max_rounds(),
            model_selection_attempts: default_model_selection_attempts(),
            memory_window: default_memory_window(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// How long a group's tool list stays cached
    #[serde(default = "default_metadata_ttl_secs")]
    pub metadata_ttl_secs: u64,

    /// Deadline for a single tool call
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,

    /// Attempts for a call failing at the transport level
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Audit entries kept in memory; 0 keeps none
    #[serde(default = "default_audit_max_entries")]
    pub audit_max_entries: usize,

    /// Remote tool groups by name
    #[serde(default)]
    pub groups: HashMap<String, ToolGroupConfig>,
}

fn default_metadata_ttl_secs() -> u64 {
    300
}
fn default_call_timeout_ms() -> u64 {
    30_000
}
fn default_max_attempts() -> u32 {
    3
}
fn default_audit_max_entries() -> usize {
    1000
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            metadata_ttl_secs: default_metadata_ttl_secs(),
            call_timeout_ms: default_call_timeout_ms(),
            max_attempts: default_max_attempts(),
            audit_max_entries: default_audit_max_entries(),
            groups: HashMap::new(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ToolGroupConfig {
    pub endpoint: String,

    /// Extra HTTP headers (usually credentials)
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Tool name patterns this host may use. Empty = all.
    #[serde(default)]
    pub allow_list: Vec<String>,
}

impl std::fmt::Debug for ToolGroupConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let headers: Vec<&String> = self.headers.keys().collect();
        f.debug_struct("ToolGroupConfig")
            .field("endpoint", &self.endpoint)
            .field("headers", &format_args!("{headers:?} [REDACTED]"))
            .field("allow_list", &self.allow_list)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.agentweave/config.toml).
    ///
    /// Also checks environment variables:
    /// - `AGENTWEAVE_API_KEY` (highest priority), then `OPENAI_API_KEY`
    /// - `AGENTWEAVE_PROVIDER`
    /// - `AGENTWEAVE_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if self.api_key.is_none() {
            self.api_key = std::env::var("AGENTWEAVE_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(provider) = std::env::var("AGENTWEAVE_PROVIDER") {
            self.default_provider = provider;
        }

        if let Ok(model) = std::env::var("AGENTWEAVE_MODEL") {
            self.default_model = model;
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".agentweave")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.default_temperature) {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_retry_count == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_retry_count must be at least 1".into(),
            ));
        }

        if self.agent.model_selection_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "agent.model_selection_attempts must be at least 1".into(),
            ));
        }

        if self.memory.cache_ttl_secs == 0 || self.tools.metadata_ttl_secs == 0 {
            return Err(ConfigError::ValidationError(
                "cache TTLs must be greater than zero".into(),
            ));
        }

        if self.memory.janitor_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "memory.janitor_interval_secs must be at least 1".into(),
            ));
        }

        if !matches!(self.memory.discard_strategy.as_str(), "fifo" | "similarity") {
            return Err(ConfigError::ValidationError(format!(
                "memory.discard_strategy must be \"fifo\" or \"similarity\", got \"{}\"",
                self.memory.discard_strategy
            )));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for the `config` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            api_url: None,
            default_model: default_model(),
            fallback_models: Vec::new(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            memory: MemoryConfig::default(),
            agent: AgentConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
