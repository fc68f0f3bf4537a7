//! Read path: embed a query and search the vector index.

use crate::{
    embedding::EmbeddingClient,
    index::{SearchResult, VectorIndex},
    processing::types::QueryError,
};
use std::sync::Arc;

/// Embeds query text and returns the nearest stored chunks.
#[derive(Clone)]
pub struct RetrievalService {
    embedder: Arc<dyn EmbeddingClient>,
    index: Arc<dyn VectorIndex>,
    max_top_k: usize,
}

impl RetrievalService {
    /// Build a retrieval service; caller supplied `top_k` values are capped at `max_top_k`.
    pub fn new(
        embedder: Arc<dyn EmbeddingClient>,
        index: Arc<dyn VectorIndex>,
        max_top_k: usize,
    ) -> Self {
        Self {
            embedder,
            index,
            max_top_k: max_top_k.max(1),
        }
    }

    /// Upper bound applied to `top_k`.
    pub fn max_top_k(&self) -> usize {
        self.max_top_k
    }

    fn effective_top_k(&self, requested: usize) -> usize {
        let top_k = requested.clamp(1, self.max_top_k);
        if requested > self.max_top_k {
            tracing::warn!(
                requested,
                max_top_k = self.max_top_k,
                "Reducing top_k to the search cap"
            );
        }
        top_k
    }

    /// Return up to `top_k` chunks most similar to `text`, best first.
    ///
    /// Blank text is rejected before any embedding or index call.
    pub async fn query(&self, text: &str, top_k: usize) -> Result<Vec<SearchResult>, QueryError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(QueryError::EmptyQuery);
        }
        let top_k = self.effective_top_k(top_k);

        let mut vectors = self
            .embedder
            .generate_embeddings(vec![text.to_string()])
            .await?;
        let vector = vectors.pop().ok_or(QueryError::EmptyEmbedding)?;

        let results = self.index.search(&vector, top_k).await?;
        tracing::debug!(top_k, hits = results.len(), "Query completed");
        Ok(results)
    }
}
