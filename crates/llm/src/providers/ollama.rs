//! Local Ollama chat provider.
//!
//! Uses the non-streaming `POST /api/chat` endpoint, see
//! https://github.com/ollama/ollama/blob/main/docs/api.md

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage, Turn};
use crate::types::ProviderType;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use teller_core::{AppError, AppResult};

/// Local models can be slow to load on first use.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: Vec<Turn<'a>>,
    options: Options,
    stream: bool,
}

#[derive(Debug, Default, Serialize)]
struct Options {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    message: Option<ReplyMessage>,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: u32,
    #[serde(default)]
    eval_count: u32,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct ErrorReply {
    error: String,
}

/// Client for a local Ollama server.
pub struct OllamaClient {
    base_url: String,
    client: reqwest::Client,
}

impl OllamaClient {
    /// Client for the default local server.
    pub fn new() -> Self {
        Self::with_base_url(ProviderType::Ollama.default_endpoint())
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    fn to_body<'a>(request: &'a LlmRequest) -> ChatBody<'a> {
        ChatBody {
            model: &request.model,
            messages: request.turns(),
            options: Options {
                temperature: request.temperature,
                top_p: request.top_p,
                num_predict: request.max_tokens,
            },
            stream: false,
        }
    }

    fn parse_reply(body: &str, fallback_model: &str) -> AppResult<LlmResponse> {
        let reply: ChatReply = serde_json::from_str(body)
            .map_err(|e| AppError::Llm(format!("Failed to parse Ollama reply: {}", e)))?;

        let message = reply
            .message
            .ok_or_else(|| AppError::Llm("Ollama reply contained no message".to_string()))?;

        Ok(LlmResponse {
            content: message.content,
            model: reply.model.unwrap_or_else(|| fallback_model.to_string()),
            usage: LlmUsage::new(reply.prompt_eval_count, reply.eval_count),
            finish_reason: reply.done_reason,
        })
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LlmClient for OllamaClient {
    fn provider_name(&self) -> &str {
        ProviderType::Ollama.as_str()
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        let url = format!("{}/api/chat", self.base_url);
        tracing::debug!(url = %url, model = %request.model, "Sending Ollama chat request");

        let response = self
            .client
            .post(&url)
            .json(&Self::to_body(request))
            .send()
            .await
            .map_err(|e| {
                AppError::Llm(format!(
                    "Ollama is not reachable at {} ({}), is `ollama serve` running?",
                    self.base_url, e
                ))
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::Llm(format!("Failed to read Ollama reply: {}", e)))?;

        if !status.is_success() {
            // Ollama reports errors as {"error": "..."}, e.g. an unpulled model
            let detail = serde_json::from_str::<ErrorReply>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            return Err(AppError::Llm(format!("Ollama error ({}): {}", status, detail)));
        }

        Self::parse_reply(&body, &request.model)
    }
}
