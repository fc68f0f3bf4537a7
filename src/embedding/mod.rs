//! Embedding client abstraction and adapters.
//!
//! Every backend maps a batch of texts to one vector per input, preserving order. Remote
//! backends are checked for a vector per input and a uniform dimension before results leave
//! this module, so the index layer only has to compare against its collection size.

mod hashing;
mod remote;

use crate::config::{Config, EmbeddingProvider};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

pub use hashing::HashingEmbedder;
pub use remote::{OllamaEmbeddingClient, OpenAiEmbeddingClient};

const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Provider was unable to produce embeddings for the supplied input.
    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),
    /// Provider could not be reached.
    #[error("Embedding provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider answered with a payload that does not match the request.
    #[error("Malformed embedding response: {0}")]
    InvalidResponse(String),
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce an embedding vector for each supplied chunk of text.
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError>;
}

/// Build an embedding client suitable for the given configuration.
pub fn build_embedding_client(
    config: &Config,
) -> Result<Arc<dyn EmbeddingClient>, EmbeddingClientError> {
    tracing::debug!(
        provider = ?config.embedding_provider,
        model = %config.embedding_model,
        dimension = config.embedding_dimension,
        "Building embedding client"
    );
    let client: Arc<dyn EmbeddingClient> = match config.embedding_provider {
        EmbeddingProvider::Hashing => Arc::new(HashingEmbedder::new(config.embedding_dimension)?),
        EmbeddingProvider::Ollama => Arc::new(OllamaEmbeddingClient::new(
            config
                .ollama_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            config.embedding_model.clone(),
        )?),
        EmbeddingProvider::OpenAI => {
            let api_key = config.openai_api_key.clone().ok_or_else(|| {
                EmbeddingClientError::ProviderUnavailable("OPENAI_API_KEY is not set".into())
            })?;
            Arc::new(OpenAiEmbeddingClient::new(
                config
                    .openai_base_url
                    .clone()
                    .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
                api_key,
                config.embedding_model.clone(),
            )?)
        }
    };
    Ok(client)
}

/// Check that a provider returned one vector per input, all of the same length.
pub(crate) fn validate_batch(
    expected_count: usize,
    vectors: &[Vec<f32>],
) -> Result<(), EmbeddingClientError> {
    if vectors.len() != expected_count {
        return Err(EmbeddingClientError::InvalidResponse(format!(
            "expected {expected_count} vectors, got {}",
            vectors.len()
        )));
    }
    if let Some(first) = vectors.first() {
        let dimension = first.len();
        if dimension == 0 {
            return Err(EmbeddingClientError::InvalidResponse(
                "provider returned empty vectors".into(),
            ));
        }
        if let Some(other) = vectors.iter().find(|vector| vector.len() != dimension) {
            return Err(EmbeddingClientError::InvalidResponse(format!(
                "inconsistent vector dimensions: {dimension} and {}",
                other.len()
            )));
        }
    }
    Ok(())
}
