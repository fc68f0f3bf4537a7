//! Process-local vector index using cosine similarity.

use super::{IndexError, SearchResult, VectorIndex, check_dimension, check_upsert, point_id};
use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug)]
struct StoredPoint {
    document_id: String,
    chunk_index: usize,
    text: String,
    vector: Vec<f32>,
}

#[derive(Debug)]
struct Collection {
    dimension: usize,
    points: HashMap<Uuid, StoredPoint>,
}

/// In-memory implementation of [`VectorIndex`], used offline and in tests.
#[derive(Debug)]
pub struct InMemoryIndex {
    name: String,
    collection: RwLock<Option<Collection>>,
}

impl InMemoryIndex {
    /// Create an empty index whose collection will carry `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            collection: RwLock::new(None),
        }
    }

    /// Number of points currently stored.
    pub async fn len(&self) -> usize {
        self.collection
            .read()
            .await
            .as_ref()
            .map_or(0, |collection| collection.points.len())
    }

    /// Whether the index holds no points.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Configured dimension, if the collection exists.
    pub async fn dimension(&self) -> Option<usize> {
        self.collection
            .read()
            .await
            .as_ref()
            .map(|collection| collection.dimension)
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn ensure_collection(&self, vector_size: usize) -> Result<(), IndexError> {
        let mut guard = self.collection.write().await;
        match guard.as_ref() {
            Some(existing) => {
                if existing.dimension != vector_size {
                    tracing::warn!(
                        collection = %self.name,
                        configured = existing.dimension,
                        requested = vector_size,
                        "Collection exists with a different vector size"
                    );
                }
            }
            None => {
                tracing::debug!(collection = %self.name, vector_size, "Creating collection");
                *guard = Some(Collection {
                    dimension: vector_size,
                    points: HashMap::new(),
                });
            }
        }
        Ok(())
    }

    async fn upsert(
        &self,
        document_id: &str,
        chunks: &[String],
        vectors: &[Vec<f32>],
    ) -> Result<usize, IndexError> {
        let mut guard = self.collection.write().await;
        let collection = guard
            .as_mut()
            .ok_or_else(|| IndexError::MissingCollection(self.name.clone()))?;
        check_upsert(collection.dimension, chunks, vectors)?;

        for (chunk_index, (text, vector)) in chunks.iter().zip(vectors).enumerate() {
            collection.points.insert(
                point_id(document_id, chunk_index),
                StoredPoint {
                    document_id: document_id.to_string(),
                    chunk_index,
                    text: text.clone(),
                    vector: vector.clone(),
                },
            );
        }
        Ok(chunks.len())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>, IndexError> {
        let guard = self.collection.read().await;
        let Some(collection) = guard.as_ref() else {
            return Ok(Vec::new());
        };
        check_dimension(collection.dimension, query_vector)?;

        let mut scored: Vec<SearchResult> = collection
            .points
            .values()
            .map(|point| SearchResult {
                document_id: point.document_id.clone(),
                chunk_index: point.chunk_index,
                text: point.text.clone(),
                score: cosine_similarity(&point.vector, query_vector),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.document_id.cmp(&b.document_id))
                .then_with(|| a.chunk_index.cmp(&b.chunk_index))
        });
        scored.truncate(top_k);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|text| text.to_string()).collect()
    }

    #[tokio::test]
    async fn self_match_ranks_first_with_maximal_score() {
        let index = InMemoryIndex::new("docs");
        index.ensure_collection(3).await.expect("collection");
        let vectors = vec![
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.6, 0.8, 0.0],
        ];
        index
            .upsert("doc-1", &chunks(&["alpha", "beta", "gamma"]), &vectors)
            .await
            .expect("upsert");

        let results = index.search(&vectors[1], 3).await.expect("search");
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].text, "beta");
        assert_eq!(results[0].chunk_index, 1);
        assert_eq!(results[0].document_id, "doc-1");
        assert!(results.windows(2).all(|pair| pair[0].score >= pair[1].score));
    }

    #[tokio::test]
    async fn ensure_collection_is_idempotent_and_keeps_first_size() {
        let index = InMemoryIndex::new("docs");
        index.ensure_collection(4).await.expect("first");
        index.ensure_collection(8).await.expect("second");
        assert_eq!(index.dimension().await, Some(4));
    }

    #[tokio::test]
    async fn reupsert_overwrites_instead_of_duplicating() {
        let index = InMemoryIndex::new("docs");
        index.ensure_collection(2).await.expect("collection");
        let texts = chunks(&["one", "two"]);
        let vectors = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        index.upsert("doc", &texts, &vectors).await.expect("first");
        index.upsert("doc", &texts, &vectors).await.expect("second");
        assert_eq!(index.len().await, 2);
    }

    #[tokio::test]
    async fn mismatched_dimensions_are_rejected() {
        let index = InMemoryIndex::new("docs");
        index.ensure_collection(2).await.expect("collection");
        let error = index
            .upsert("doc", &chunks(&["one"]), &[vec![1.0, 0.0, 0.0]])
            .await
            .expect_err("upsert mismatch");
        assert!(matches!(
            error,
            IndexError::DimensionMismatch { expected: 2, actual: 3 }
        ));

        let error = index.search(&[1.0], 5).await.expect_err("search mismatch");
        assert!(matches!(error, IndexError::DimensionMismatch { .. }));
    }

    #[tokio::test]
    async fn search_before_creation_is_empty_and_upsert_fails() {
        let index = InMemoryIndex::new("docs");
        assert!(index.search(&[1.0, 0.0], 5).await.expect("search").is_empty());
        let error = index
            .upsert("doc", &chunks(&["one"]), &[vec![1.0, 0.0]])
            .await
            .expect_err("missing collection");
        assert!(matches!(error, IndexError::MissingCollection(name) if name == "docs"));
    }
}
