//! Embedding provider implementations.

pub mod hashed;
pub mod openai;

pub use hashed::HashedProvider;
pub use openai::OpenAiEmbeddingProvider;
