//! OpenAI-compatible chat completions provider.
//!
//! DeepSeek exposes the same `POST /chat/completions` interface as OpenAI,
//! so one client serves both.

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage, Turn};
use crate::types::ProviderType;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use teller_core::{AppError, AppResult};

/// Request timeout for completions.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Turn<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Client for any OpenAI-compatible `chat/completions` endpoint.
pub struct OpenAiCompatClient {
    provider: ProviderType,
    base_url: String,
    api_key: Option<String>,
    api_key_env: String,
    client: reqwest::Client,
}

impl OpenAiCompatClient {
    /// Create a client for `provider` at `base_url`.
    ///
    /// A missing API key is accepted here and reported on each request, so a
    /// service can start before its credentials are in place.
    pub fn new(
        provider: ProviderType,
        base_url: impl Into<String>,
        api_key: Option<String>,
        api_key_env: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            provider,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            api_key_env: api_key_env.into(),
            client,
        }
    }

    /// DeepSeek client with the default endpoint.
    pub fn deepseek(api_key: Option<String>) -> Self {
        Self::new(
            ProviderType::DeepSeek,
            ProviderType::DeepSeek.default_endpoint(),
            api_key,
            "DEEPSEEK_API_KEY",
        )
    }

    fn to_request<'a>(&self, request: &'a LlmRequest) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: &request.model,
            messages: request.turns(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            top_p: request.top_p,
            stream: false,
        }
    }

    fn parse_response(body: &str, fallback_model: &str) -> AppResult<LlmResponse> {
        let parsed: ChatCompletionResponse = serde_json::from_str(body)
            .map_err(|e| AppError::Llm(format!("Failed to parse completion response: {}", e)))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Llm("Completion response contained no choices".to_string()))?;

        let usage = parsed
            .usage
            .map(|u| LlmUsage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        Ok(LlmResponse {
            content: choice.message.content.unwrap_or_default(),
            model: parsed.model.unwrap_or_else(|| fallback_model.to_string()),
            usage,
            finish_reason: choice.finish_reason,
        })
    }

    fn map_http_error(&self, status: reqwest::StatusCode, body: &str) -> AppError {
        let detail = serde_json::from_str::<ErrorEnvelope>(body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| body.to_string());

        let message = match status.as_u16() {
            401 | 403 => format!(
                "{} rejected the credentials (check {}): {}",
                self.provider, self.api_key_env, detail
            ),
            429 => format!("{} rate limit reached: {}", self.provider, detail),
            s if s >= 500 => format!("{} server error ({}): {}", self.provider, status, detail),
            _ => format!("{} API error ({}): {}", self.provider, status, detail),
        };

        AppError::Llm(message)
    }
}

#[async_trait::async_trait]
impl LlmClient for OpenAiCompatClient {
    fn provider_name(&self) -> &str {
        self.provider.as_str()
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            AppError::Llm(format!(
                "{} API key not configured, set {}",
                self.provider, self.api_key_env
            ))
        })?;

        let url = format!("{}/chat/completions", self.base_url);
        tracing::debug!(url = %url, model = %request.model, "Sending chat completion request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&self.to_request(request))
            .send()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to send request to {}: {}", self.provider, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(self.map_http_error(status, &body));
        }

        let parsed = Self::parse_response(&body, &request.model)?;

        tracing::debug!(
            "Completion from {}: {} prompt tokens, {} completion tokens",
            self.provider,
            parsed.usage.prompt_tokens,
            parsed.usage.completion_tokens
        );

        Ok(parsed)
    }
}
