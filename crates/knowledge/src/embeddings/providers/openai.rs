//! OpenAI-compatible embedding provider.
//!
//! Calls `POST {base}/embeddings`, which OpenAI and most hosted or
//! self-hosted gateways expose with the same request and response shape.

use crate::embeddings::EmbeddingProvider;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use teller_core::{AppError, AppResult};
use tracing::{debug, warn};

/// Maximum retry attempts for failed requests
const MAX_RETRIES: u32 = 3;

/// Initial backoff duration in milliseconds
const INITIAL_BACKOFF_MS: u64 = 100;

/// Request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Texts sent per request
const BATCH_SIZE: usize = 64;

/// OpenAI-compatible embedding provider.
#[derive(Debug, Clone)]
pub struct OpenAiEmbeddingProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    dimensions: usize,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

impl OpenAiEmbeddingProvider {
    /// Default API base URL.
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.openai.com/v1";

    /// Create a provider for `model` at `base_url`.
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        dimensions: usize,
    ) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::Knowledge(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            dimensions,
        })
    }

    /// Embed one request batch with retry logic.
    async fn embed_with_retries(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let mut attempt = 0;
        let mut last_error = None;

        while attempt < MAX_RETRIES {
            match self.embed_request(texts).await {
                Ok(embeddings) => return Ok(embeddings),
                Err(e) => {
                    attempt += 1;
                    last_error = Some(e);

                    if attempt < MAX_RETRIES {
                        let backoff_ms = INITIAL_BACKOFF_MS * 2_u64.pow(attempt);
                        warn!(
                            "Embedding failed (attempt {}/{}), retrying in {}ms",
                            attempt, MAX_RETRIES, backoff_ms
                        );
                        tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    }
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| AppError::Knowledge("Unknown embedding error".to_string())))
    }

    async fn embed_request(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);
        debug!("Sending embedding request for {} texts to {}", texts.len(), url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(|e| AppError::Knowledge(format!("Failed to send embedding request: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::Knowledge(format!("Failed to read embedding response: {}", e)))?;

        if !status.is_success() {
            return Err(AppError::Knowledge(format!(
                "Embedding API error ({}): {}",
                status, body
            )));
        }

        self.parse_response(&body, texts.len())
    }

    fn parse_response(&self, body: &str, expected: usize) -> AppResult<Vec<Vec<f32>>> {
        let mut parsed: EmbeddingResponse = serde_json::from_str(body)
            .map_err(|e| AppError::Knowledge(format!("Failed to parse embedding response: {}", e)))?;

        if parsed.data.len() != expected {
            return Err(AppError::Knowledge(format!(
                "Embedding API returned {} vectors for {} inputs",
                parsed.data.len(),
                expected
            )));
        }

        parsed.data.sort_by_key(|d| d.index);

        parsed
            .data
            .into_iter()
            .map(|d| {
                if d.embedding.len() != self.dimensions {
                    Err(AppError::Knowledge(format!(
                        "Unexpected embedding dimensions: got {}, expected {}",
                        d.embedding.len(),
                        self.dimensions
                    )))
                } else {
                    Ok(d.embedding)
                }
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(BATCH_SIZE) {
            embeddings.extend(self.embed_with_retries(batch).await?);
        }
        Ok(embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(dimensions: usize) -> OpenAiEmbeddingProvider {
        OpenAiEmbeddingProvider::new("https://example.test/v1/", "sk", "text-embedding-3-small", dimensions)
            .unwrap()
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        assert_eq!(provider(3).base_url, "https://example.test/v1");
    }

    #[test]
    fn test_parse_response_orders_by_index() {
        let body = r#"{"data": [
            {"object": "embedding", "index": 1, "embedding": [0.0, 1.0, 0.0]},
            {"object": "embedding", "index": 0, "embedding": [1.0, 0.0, 0.0]}
        ], "model": "text-embedding-3-small"}"#;

        let vectors = provider(3).parse_response(body, 2).unwrap();
        assert_eq!(vectors[0], vec![1.0, 0.0, 0.0]);
        assert_eq!(vectors[1], vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_parse_response_checks_dimensions() {
        let body = r#"{"data": [{"index": 0, "embedding": [1.0, 0.0]}]}"#;
        assert!(provider(3).parse_response(body, 1).is_err());
    }

    #[test]
    fn test_parse_response_checks_count() {
        let body = r#"{"data": []}"#;
        assert!(provider(3).parse_response(body, 1).is_err());
    }

    #[tokio::test]
    async fn test_empty_batch_makes_no_request() {
        let embeddings = provider(3).embed_batch(&[]).await.unwrap();
        assert!(embeddings.is_empty());
    }
}
