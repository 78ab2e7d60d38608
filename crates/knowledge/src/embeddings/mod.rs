//! Embedding generation for the knowledge base.
//!
//! Provides provider-agnostic embedding generation selected from the
//! `knowledge.embedding` configuration section.

pub mod provider;
pub mod providers;

pub use provider::{create_provider, EmbeddingProvider};
pub use providers::{HashedProvider, OpenAiEmbeddingProvider};

/// Embedding settings, shared with the application configuration.
pub type EmbeddingConfig = teller_core::config::EmbeddingSettings;
