//! `agentweave chat`: one turn against the configured provider.

use std::sync::Arc;
use std::time::Duration;

use agentweave_agent::{Host, TurnSettings};
use agentweave_config::AppConfig;
use agentweave_core::agent::AgentProfile;
use agentweave_core::message::ConversationId;
use agentweave_memory::{ConversationMemoryEngine, DiscardStrategy, InMemoryConversationStore, InMemoryFragmentStore};
use agentweave_security::{AuditLogger, ToolAllowlist, TracingSink};
use agentweave_tools::{HttpTransport, ToolEndpoint, ToolInvocationClient, ToolResource};
use tracing::{info, warn};

pub async fn run(
    message: String,
    agent: String,
    conversation: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if !config.has_api_key() && config.default_provider != "ollama" {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set AGENTWEAVE_API_KEY or OPENAI_API_KEY, or add api_key to:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let memory = Arc::new(
        ConversationMemoryEngine::new(Arc::new(InMemoryConversationStore::new()))
            .with_ttl(Duration::from_secs(config.memory.cache_ttl_secs))
            .with_max_chat_round(config.memory.max_chat_round)
            .with_pacing(Duration::from_millis(config.memory.stream_pacing_ms)),
    );
    let janitor = memory.spawn_janitor(Duration::from_secs(config.memory.janitor_interval_secs));

    let (provider, models) = agentweave_providers::build_from_config(&config);
    let host = Host::new(memory.clone(), provider, models, TurnSettings::from_config(&config));

    if let Some(tools) = build_tools(&config) {
        host.bind_resource(Arc::new(tools)).await;
    }

    let strategy = config.memory.discard_strategy.parse().unwrap_or_else(|e| {
        warn!(error = %e, "Falling back to fifo discard strategy");
        DiscardStrategy::Fifo
    });
    host.bind_memory(Arc::new(InMemoryFragmentStore::new(config.memory.fragment_capacity, strategy)))
        .await;

    let profile = AgentProfile::new("Assistant", "Answer the user's request accurately and concisely")
        .with_description("{name} works step by step and uses resources when they help.");
    host.register_agent(&agent, &profile).await;

    let conversation_id = conversation.map(|c| ConversationId::from(&c)).unwrap_or_default();
    info!(conversation_id = %conversation_id, agent = %agent, "Starting chat");
    host.bind_context(&conversation_id, None, None, 0).await;

    let reply = host.chat(&conversation_id, &agent, &message).await;
    let view = memory.final_view(&conversation_id).await;
    println!("{}", serde_json::to_string_pretty(&view)?);

    janitor.abort();
    if !reply.success {
        return Err(format!("Turn failed: {}", reply.content).into());
    }
    Ok(())
}

/// Tool resource over the configured groups, if any.
fn build_tools(config: &AppConfig) -> Option<ToolResource> {
    if config.tools.groups.is_empty() {
        return None;
    }

    let audit = Arc::new(
        AuditLogger::with_sinks(vec![Box::new(TracingSink)]).with_max_entries(config.tools.audit_max_entries),
    );
    let client = ToolInvocationClient::new(Arc::new(HttpTransport::new()), audit)
        .with_metadata_ttl(Duration::from_secs(config.tools.metadata_ttl_secs))
        .with_max_attempts(config.tools.max_attempts);

    let mut names: Vec<&String> = config.tools.groups.keys().collect();
    names.sort();

    let mut tools = ToolResource::new("tools", Arc::new(client))
        .with_timeout(Duration::from_millis(config.tools.call_timeout_ms));
    for name in names {
        let group = &config.tools.groups[name];
        let mut endpoint = ToolEndpoint::new(group.endpoint.clone())
            .with_allow_list(ToolAllowlist::new(group.allow_list.iter().cloned()));
        for (header, value) in &group.headers {
            endpoint = endpoint.with_header(header.clone(), value.clone());
        }
        tools = tools.with_group(name.clone(), endpoint);
    }
    Some(tools)
}
