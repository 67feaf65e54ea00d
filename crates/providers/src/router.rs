//! Provider router: builds the configured provider and its model chain.

use std::sync::Arc;

use agentweave_config::AppConfig;
use agentweave_core::provider::Provider;
use tracing::info;

use crate::fallback::ModelFallback;
use crate::openai_compat::OpenAiCompatProvider;

/// Build the provider and the model fallback chain from configuration.
///
/// Every supported backend speaks the OpenAI-compatible protocol; the
/// provider name only selects a default base URL, which `api_url` overrides.
pub fn build_from_config(config: &AppConfig) -> (Arc<dyn Provider>, ModelFallback) {
    let api_key = config.api_key.clone().unwrap_or_default();
    let base_url = config
        .api_url
        .clone()
        .unwrap_or_else(|| default_base_url(&config.default_provider));

    info!(
        provider = %config.default_provider,
        base_url = %base_url,
        model = %config.default_model,
        fallbacks = config.fallback_models.len(),
        "Building provider"
    );

    let provider: Arc<dyn Provider> = Arc::new(OpenAiCompatProvider::new(
        &config.default_provider,
        base_url,
        api_key,
    ));
    let models = ModelFallback::with_primary(&config.default_model, &config.fallback_models);
    (provider, models)
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "deepseek" => "https://api.deepseek.com/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_base_urls() {
        assert!(default_base_url("openrouter").contains("openrouter.ai"));
        assert!(default_base_url("openai").contains("api.openai.com"));
        assert!(default_base_url("ollama").contains("localhost:11434"));
    }

    #[test]
    fn build_from_default_config() {
        let config = AppConfig::default();
        let (provider, models) = build_from_config(&config);
        assert_eq!(provider.name(), "openai");
        assert_eq!(models.primary(), Some("gpt-4o-mini"));
    }

    #[test]
    fn fallback_models_follow_primary() {
        let config = AppConfig {
            default_provider: "deepseek".into(),
            default_model: "deepseek-reasoner".into(),
            fallback_models: vec!["deepseek-chat".into()],
            ..AppConfig::default()
        };
        let (provider, models) = build_from_config(&config);
        assert_eq!(provider.name(), "deepseek");
        assert_eq!(models.models(), &["deepseek-reasoner".to_string(), "deepseek-chat".to_string()]);
    }
}
