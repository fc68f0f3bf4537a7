//! Vector index abstraction shared by the ingestion, retrieval, and theme services.
//!
//! The index manages exactly one collection. It is created lazily by
//! [`VectorIndex::ensure_collection`], and every vector written or queried afterwards must
//! match the collection's configured size. Point identity is derived from
//! `(document_id, chunk_index)` so re-ingesting a chunk overwrites the previous point.

mod memory;

use crate::qdrant::QdrantError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use memory::InMemoryIndex;

/// Errors raised at the vector index boundary.
#[derive(Debug, Error)]
pub enum IndexError {
    /// A vector's length disagrees with the collection's configured size.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension configured on the collection.
        expected: usize,
        /// Dimension of the offending vector.
        actual: usize,
    },
    /// Upsert received a different number of chunks and vectors.
    #[error("Chunk/vector count mismatch: {chunks} chunks, {vectors} vectors")]
    LengthMismatch {
        /// Number of chunk texts supplied.
        chunks: usize,
        /// Number of vectors supplied.
        vectors: usize,
    },
    /// The collection has not been created yet.
    #[error("Collection '{0}' does not exist")]
    MissingCollection(String),
    /// The Qdrant backend failed.
    #[error("Qdrant request failed: {0}")]
    Qdrant(#[from] QdrantError),
}

/// A stored chunk matched by a similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Document the chunk belongs to.
    pub document_id: String,
    /// Zero-based position of the chunk inside its document.
    pub chunk_index: usize,
    /// Chunk text as stored in the payload.
    pub text: String,
    /// Similarity score; higher is more similar.
    pub score: f32,
}

/// Collection lifecycle, writes, and k-nearest-neighbour search over one vector collection.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create the collection with cosine distance if it is absent; no-op otherwise.
    ///
    /// An existing collection is not resized. Its configured size is what later calls are
    /// checked against.
    async fn ensure_collection(&self, vector_size: usize) -> Result<(), IndexError>;

    /// Write one point per `(chunk, vector)` pair, returning the number of points written.
    async fn upsert(
        &self,
        document_id: &str,
        chunks: &[String],
        vectors: &[Vec<f32>],
    ) -> Result<usize, IndexError>;

    /// Return up to `top_k` nearest chunks, ordered by descending score.
    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>, IndexError>;
}

/// Deterministic point identifier for a chunk.
pub fn point_id(document_id: &str, chunk_index: usize) -> Uuid {
    Uuid::new_v5(
        &Uuid::NAMESPACE_OID,
        format!("{document_id}:{chunk_index}").as_bytes(),
    )
}

/// Reject writes whose inputs disagree with each other or with the collection size.
pub(crate) fn check_upsert(
    expected: usize,
    chunks: &[String],
    vectors: &[Vec<f32>],
) -> Result<(), IndexError> {
    if chunks.len() != vectors.len() {
        return Err(IndexError::LengthMismatch {
            chunks: chunks.len(),
            vectors: vectors.len(),
        });
    }
    for vector in vectors {
        check_dimension(expected, vector)?;
    }
    Ok(())
}

pub(crate) fn check_dimension(expected: usize, vector: &[f32]) -> Result<(), IndexError> {
    if vector.len() != expected {
        return Err(IndexError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_id_is_stable_per_chunk() {
        let first = point_id("doc-1", 0);
        assert_eq!(first, point_id("doc-1", 0));
        assert_ne!(first, point_id("doc-1", 1));
        assert_ne!(first, point_id("doc-2", 0));
    }

    #[test]
    fn check_upsert_reports_both_kinds_of_mismatch() {
        let chunks = vec!["a".to_string(), "b".to_string()];
        assert!(matches!(
            check_upsert(2, &chunks, &[vec![0.0, 1.0]]),
            Err(IndexError::LengthMismatch { chunks: 2, vectors: 1 })
        ));
        assert!(matches!(
            check_upsert(2, &chunks, &[vec![0.0, 1.0], vec![1.0]]),
            Err(IndexError::DimensionMismatch { expected: 2, actual: 1 })
        ));
        assert!(check_upsert(2, &chunks, &[vec![0.0, 1.0], vec![1.0, 0.0]]).is_ok());
    }
}
