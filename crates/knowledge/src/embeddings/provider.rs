//! Embedding provider trait and factory.

use super::providers::{HashedProvider, OpenAiEmbeddingProvider};
use super::EmbeddingConfig;
use std::sync::Arc;
use teller_core::{AppError, AppResult};

/// Trait for embedding providers.
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync + std::fmt::Debug {
    /// Get provider name (e.g., "hashed", "openai")
    fn provider_name(&self) -> &str;

    /// Get model identifier
    fn model_name(&self) -> &str;

    /// Get embedding dimensions
    fn dimensions(&self) -> usize;

    /// Generate embeddings for multiple texts in a batch.
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>>;

    /// Generate embedding for a single text (convenience method).
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text.to_string()]).await?;
        results
            .pop()
            .ok_or_else(|| AppError::Knowledge("No embedding returned".to_string()))
    }
}

/// Create an embedding provider based on configuration.
///
/// `api_key` is only used by remote providers.
pub fn create_provider(
    config: &EmbeddingConfig,
    api_key: Option<&str>,
) -> AppResult<Arc<dyn EmbeddingProvider>> {
    if config.dimensions == 0 {
        return Err(AppError::Knowledge(
            "Embedding dimensions must be positive".to_string(),
        ));
    }

    match config.provider.as_str() {
        "hashed" => Ok(Arc::new(HashedProvider::new(config.dimensions))),

        "openai" => {
            let endpoint = config
                .endpoint
                .as_deref()
                .unwrap_or(OpenAiEmbeddingProvider::DEFAULT_ENDPOINT);
            let api_key = api_key.ok_or_else(|| {
                AppError::Knowledge(format!(
                    "Embedding provider 'openai' needs an API key ({})",
                    config.api_key_env.as_deref().unwrap_or("OPENAI_API_KEY")
                ))
            })?;
            Ok(Arc::new(OpenAiEmbeddingProvider::new(
                endpoint,
                api_key,
                &config.model,
                config.dimensions,
            )?))
        }

        _ => Err(AppError::Knowledge(format!(
            "Unknown embedding provider: '{}'. Supported providers: hashed, openai",
            config.provider
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_hashed_provider() {
        let config = EmbeddingConfig::default();

        let provider = create_provider(&config, None).unwrap();
        assert_eq!(provider.provider_name(), "hashed");
        assert_eq!(provider.model_name(), "hashed-v1");
        assert_eq!(provider.dimensions(), 384);
    }

    #[test]
    fn test_create_openai_provider_requires_key() {
        let config = EmbeddingConfig {
            provider: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
            endpoint: None,
            api_key_env: Some("EMBEDDING_API_KEY".to_string()),
        };

        let err = create_provider(&config, None).unwrap_err();
        assert!(err.to_string().contains("EMBEDDING_API_KEY"));

        let provider = create_provider(&config, Some("sk-test")).unwrap();
        assert_eq!(provider.provider_name(), "openai");
        assert_eq!(provider.dimensions(), 1536);
    }

    #[test]
    fn test_create_unknown_provider() {
        let config = EmbeddingConfig {
            provider: "unknown".to_string(),
            ..Default::default()
        };

        let result = create_provider(&config, None);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Unknown embedding provider"));
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        let config = EmbeddingConfig {
            dimensions: 0,
            ..Default::default()
        };
        assert!(create_provider(&config, None).is_err());
    }

    #[tokio::test]
    async fn test_provider_embed_single() {
        let config = EmbeddingConfig::default();
        let provider = create_provider(&config, None).unwrap();

        let embedding = provider.embed("test text").await.unwrap();
        assert_eq!(embedding.len(), 384);
    }
}
