//! Chat model client trait and the request/response shapes shared by every
//! provider.

use serde::{Deserialize, Serialize};
use teller_core::AppResult;

/// One message of a chat request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Turn<'a> {
    pub role: &'static str,
    pub content: &'a str,
}

/// A single-shot chat request: an optional system instruction followed by
/// one user message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmRequest {
    /// User message
    pub prompt: String,

    /// Model identifier (e.g., "deepseek-chat", "llama3.2")
    pub model: String,

    /// System instruction sent ahead of the user message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Upper bound on generated tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Sampling temperature (0.0 - 2.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Nucleus sampling cutoff
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
}

impl LlmRequest {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            system: None,
            max_tokens: None,
            temperature: None,
            top_p: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// The request as chat messages, system first when present.
    ///
    /// A blank system instruction is dropped.
    pub fn turns(&self) -> Vec<Turn<'_>> {
        let system = self
            .system
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|content| Turn {
                role: "system",
                content,
            });

        system
            .into_iter()
            .chain(std::iter::once(Turn {
                role: "user",
                content: &self.prompt,
            }))
            .collect()
    }
}

/// A completed chat reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    /// Generated text
    pub content: String,

    /// Model that produced the reply, as reported by the provider
    pub model: String,

    pub usage: LlmUsage,

    /// Provider-reported stop reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

impl LlmResponse {
    /// Whether the reply carries no usable text.
    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// Token accounting for one request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct LlmUsage {
    #[serde(default)]
    pub prompt_tokens: u32,

    #[serde(default)]
    pub completion_tokens: u32,

    #[serde(default)]
    pub total_tokens: u32,
}

impl LlmUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
        }
    }
}

/// A chat model backend.
///
/// Implemented by the hosted OpenAI-compatible client (DeepSeek, OpenAI)
/// and the local Ollama client.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Provider name, e.g. "deepseek" or "ollama".
    fn provider_name(&self) -> &str;

    /// Whether the client holds the credentials it needs.
    fn is_configured(&self) -> bool {
        true
    }

    /// Send one non-streaming chat request.
    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse>;
}
