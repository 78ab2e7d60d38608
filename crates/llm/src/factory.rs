//! LLM provider factory.
//!
//! Creates LLM clients from the configured provider name, endpoint and
//! resolved API key.

use crate::client::LlmClient;
use crate::providers::{OllamaClient, OpenAiCompatClient};
use crate::types::ProviderType;
use std::sync::Arc;
use teller_core::config::LlmSettings;
use teller_core::{AppError, AppResult};

/// Create an LLM client based on the provider name.
///
/// # Arguments
/// * `provider` - Provider identifier ("deepseek", "openai", "ollama")
/// * `endpoint` - Optional custom endpoint URL
/// * `api_key` - Optional API key; hosted providers fail per request without one
///
/// # Errors
/// Returns an error if the provider is unknown.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    api_key: Option<&str>,
) -> AppResult<Arc<dyn LlmClient>> {
    create_client_with_key_env(provider, endpoint, api_key, None)
}

/// Create an LLM client from the `llm` config section.
pub fn from_settings(settings: &LlmSettings) -> AppResult<Arc<dyn LlmClient>> {
    create_client_with_key_env(
        &settings.provider,
        settings.endpoint.as_deref(),
        settings.api_key.as_deref(),
        settings.key_env(),
    )
}

fn create_client_with_key_env(
    provider: &str,
    endpoint: Option<&str>,
    api_key: Option<&str>,
    api_key_env: Option<&str>,
) -> AppResult<Arc<dyn LlmClient>> {
    let provider_type = ProviderType::parse(provider).ok_or_else(|| {
        AppError::Config(format!(
            "Unknown provider: {}. Supported: deepseek, openai, ollama",
            provider
        ))
    })?;

    let base_url = endpoint.unwrap_or(provider_type.default_endpoint());

    let client: Arc<dyn LlmClient> = match provider_type {
        ProviderType::Ollama => Arc::new(OllamaClient::with_base_url(base_url)),
        ProviderType::DeepSeek | ProviderType::OpenAI => {
            let default_env = match provider_type {
                ProviderType::DeepSeek => "DEEPSEEK_API_KEY",
                _ => "OPENAI_API_KEY",
            };
            if api_key.is_none() {
                tracing::warn!(
                    "No API key for provider '{}', requests will fail until {} is set",
                    provider_type,
                    api_key_env.unwrap_or(default_env)
                );
            }
            Arc::new(OpenAiCompatClient::new(
                provider_type,
                base_url,
                api_key.map(str::to_string),
                api_key_env.unwrap_or(default_env),
            ))
        }
    };

    tracing::debug!("Created LLM client for provider '{}' at {}", provider_type, base_url);
    Ok(client)
}
