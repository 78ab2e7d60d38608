//! LLM integration crate for the Teller support agent.
//!
//! This crate provides a provider-agnostic abstraction for interacting with
//! Large Language Models (LLMs). It supports multiple providers through a
//! unified trait-based interface.
//!
//! # Providers
//! - **DeepSeek**: hosted, OpenAI-compatible (default)
//! - **OpenAI**: hosted, or any other OpenAI-compatible endpoint
//! - **Ollama**: local LLM runtime
//!
//! # Example
//! ```no_run
//! use teller_llm::{LlmClient, LlmRequest, providers::OpenAiCompatClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OpenAiCompatClient::deepseek(Some("sk-...".to_string()));
//! let request = LlmRequest::new("How do I open an account?", "deepseek-chat");
//! let response = client.complete(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;
pub mod types;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage, Turn};
pub use factory::{create_client, from_settings};
pub use providers::{OllamaClient, OpenAiCompatClient};
pub use types::ProviderType;
