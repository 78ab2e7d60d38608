//! Direct model answers.

use std::sync::Arc;
use teller_core::config::LlmSettings;
use teller_core::{AppError, AppResult};
use teller_llm::{LlmClient, LlmRequest};

/// Single-turn model call with the bank persona as system prompt.
#[derive(Clone)]
pub struct ModelTool {
    client: Arc<dyn LlmClient>,
    model: String,
    system: String,
    temperature: f32,
    max_tokens: u32,
}

impl ModelTool {
    pub const DEFAULT_TEMPERATURE: f32 = 0.7;
    pub const DEFAULT_MAX_TOKENS: u32 = 2000;

    pub fn new(client: Arc<dyn LlmClient>, model: impl Into<String>, system: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            system: system.into(),
            temperature: Self::DEFAULT_TEMPERATURE,
            max_tokens: Self::DEFAULT_MAX_TOKENS,
        }
    }

    /// Model, temperature and token limit from the `llm` section.
    pub fn from_settings(client: Arc<dyn LlmClient>, settings: &LlmSettings, system: impl Into<String>) -> Self {
        Self {
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            ..Self::new(client, settings.model.clone(), system)
        }
    }

    pub fn provider_name(&self) -> &str {
        self.client.provider_name()
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_configured()
    }

    /// Send `prompt` and return the reply text.
    pub async fn query(&self, prompt: &str) -> AppResult<String> {
        let request = LlmRequest::new(prompt, self.model.as_str())
            .with_system(self.system.as_str())
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);

        tracing::debug!(
            "Querying model {} via {} ({} chars)",
            self.model,
            self.client.provider_name(),
            prompt.len()
        );

        let response = self.client.complete(&request).await.map_err(|e| {
            tracing::error!("Model call failed: {}", e);
            e
        })?;

        tracing::debug!(
            "Model replied: {} tokens, finish reason {:?}",
            response.usage.total_tokens,
            response.finish_reason
        );

        if response.is_blank() {
            return Err(AppError::Llm("Model returned an empty reply".to_string()));
        }

        Ok(response.content)
    }
}
