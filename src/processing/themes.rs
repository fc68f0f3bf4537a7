//! Theme extraction: cluster retrieved chunks and summarize each cluster.

use crate::{
    completion::CompletionClient,
    embedding::EmbeddingClient,
    processing::{
        kmeans,
        retrieval::RetrievalService,
        types::{Theme, ThemeError},
    },
};
use std::sync::Arc;

const SUMMARIZER_SYSTEM_PROMPT: &str = "You are a helpful summarizer.";

/// Tuning for [`ThemeService`].
#[derive(Debug, Clone, Copy)]
pub struct ThemeSettings {
    /// Candidates retrieved before clustering.
    pub candidates: usize,
    /// Seed for the clustering step.
    pub seed: u64,
}

/// Groups chunks related to a query into themes with generated summaries.
#[derive(Clone)]
pub struct ThemeService {
    retrieval: RetrievalService,
    embedder: Arc<dyn EmbeddingClient>,
    completion: Arc<dyn CompletionClient>,
    settings: ThemeSettings,
}

impl ThemeService {
    /// Build a theme service on top of a retrieval service.
    pub fn new(
        retrieval: RetrievalService,
        embedder: Arc<dyn EmbeddingClient>,
        completion: Arc<dyn CompletionClient>,
        settings: ThemeSettings,
    ) -> Self {
        Self {
            retrieval,
            embedder,
            completion,
            settings,
        }
    }

    /// Return at most `cluster_count` themes for `text`.
    ///
    /// Themes are ordered by where their first member appears in the retrieval ranking.
    pub async fn extract_themes(
        &self,
        text: &str,
        cluster_count: usize,
    ) -> Result<Vec<Theme>, ThemeError> {
        let candidates = self.retrieval.query(text, self.settings.candidates).await?;
        if candidates.is_empty() || cluster_count == 0 {
            return Ok(Vec::new());
        }

        let texts: Vec<String> = candidates.iter().map(|hit| hit.text.clone()).collect();
        let vectors = self.embedder.generate_embeddings(texts).await?;
        let labels = kmeans::cluster(&vectors, cluster_count, self.settings.seed);

        // Cluster labels in order of first appearance.
        let mut order: Vec<usize> = Vec::new();
        for &label in &labels {
            if !order.contains(&label) {
                order.push(label);
            }
        }

        let mut themes = Vec::with_capacity(order.len());
        for label in order {
            let members: Vec<_> = candidates
                .iter()
                .zip(&labels)
                .filter(|(_, member_label)| **member_label == label)
                .map(|(hit, _)| hit)
                .collect();

            let joined = members
                .iter()
                .map(|hit| hit.text.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            let mut document_ids: Vec<String> = Vec::new();
            for hit in &members {
                if !document_ids.contains(&hit.document_id) {
                    document_ids.push(hit.document_id.clone());
                }
            }

            let prompt = format!("Summarize the following into a theme:\n\n{joined}");
            let summary = self
                .completion
                .complete(SUMMARIZER_SYSTEM_PROMPT, &prompt)
                .await?;
            tracing::debug!(
                label,
                members = members.len(),
                documents = document_ids.len(),
                "Summarized theme"
            );
            themes.push(Theme {
                summary: summary.trim().to_string(),
                document_ids,
            });
        }

        tracing::info!(
            candidates = candidates.len(),
            themes = themes.len(),
            "Theme extraction finished"
        );
        Ok(themes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        completion::CompletionError,
        embedding::HashingEmbedder,
        index::{InMemoryIndex, VectorIndex},
        processing::types::QueryError,
    };
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingCompletion {
        prompts: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl CompletionClient for RecordingCompletion {
        async fn complete(&self, system: &str, prompt: &str) -> Result<String, CompletionError> {
            if self.fail {
                return Err(CompletionError::GenerationFailed("model offline".into()));
            }
            let mut prompts = self.prompts.lock().unwrap();
            prompts.push((system.to_string(), prompt.to_string()));
            Ok(format!("  theme {}  ", prompts.len()))
        }
    }

    async fn service_with(
        documents: Vec<(&str, Vec<&str>)>,
        completion: Arc<RecordingCompletion>,
    ) -> ThemeService {
        let embedder = Arc::new(HashingEmbedder::new(64).unwrap());
        let index = Arc::new(InMemoryIndex::new("document_embeddings"));
        index.ensure_collection(64).await.unwrap();
        for (document_id, chunks) in documents {
            let chunks: Vec<String> = chunks.into_iter().map(str::to_string).collect();
            let vectors = embedder.generate_embeddings(chunks.clone()).await.unwrap();
            index.upsert(document_id, &chunks, &vectors).await.unwrap();
        }
        let retrieval = RetrievalService::new(embedder.clone(), index, 100);
        ThemeService::new(
            retrieval,
            embedder,
            completion,
            ThemeSettings {
                candidates: 15,
                seed: 42,
            },
        )
    }

    #[tokio::test]
    async fn theme_count_is_capped_by_candidates() {
        let completion = Arc::new(RecordingCompletion::default());
        let service = service_with(
            vec![("doc-a", vec!["solar panels convert sunlight", "wind turbines spin"])],
            completion.clone(),
        )
        .await;

        let themes = service.extract_themes("renewable energy", 3).await.unwrap();

        assert!(!themes.is_empty() && themes.len() <= 2);
        assert!(themes.iter().all(|theme| theme.document_ids == vec!["doc-a"]));
        assert!(themes[0].summary.starts_with("theme"));
        assert_eq!(themes[0].summary, themes[0].summary.trim());

        let prompts = completion.prompts.lock().unwrap();
        assert_eq!(prompts.len(), themes.len());
        let (system, prompt) = &prompts[0];
        assert_eq!(system, "You are a helpful summarizer.");
        assert!(prompt.starts_with("Summarize the following into a theme:\n\n"));
    }

    #[tokio::test]
    async fn single_cluster_collects_distinct_documents_in_order() {
        let completion = Arc::new(RecordingCompletion::default());
        let service = service_with(
            vec![
                ("doc-a", vec!["rivers flood in spring"]),
                ("doc-b", vec!["rivers flood in spring and autumn", "spring rivers"]),
            ],
            completion.clone(),
        )
        .await;

        let themes = service.extract_themes("rivers flood in spring", 1).await.unwrap();

        assert_eq!(themes.len(), 1);
        let mut ids = themes[0].document_ids.clone();
        ids.sort();
        assert_eq!(ids, vec!["doc-a", "doc-b"]);
        let prompts = completion.prompts.lock().unwrap();
        assert_eq!(prompts[0].1.matches('\n').count(), 2 + 2);
    }

    #[tokio::test]
    async fn no_candidates_means_no_themes_and_no_completion() {
        let completion = Arc::new(RecordingCompletion::default());
        let service = service_with(Vec::new(), completion.clone()).await;

        let themes = service.extract_themes("anything", 3).await.unwrap();

        assert!(themes.is_empty());
        assert!(completion.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_query_is_rejected() {
        let completion = Arc::new(RecordingCompletion::default());
        let service = service_with(vec![("doc-a", vec!["text"])], completion).await;

        let error = service.extract_themes("  ", 3).await.unwrap_err();
        assert!(matches!(error, ThemeError::Query(QueryError::EmptyQuery)));
    }

    #[tokio::test]
    async fn completion_failure_fails_the_request() {
        let completion = Arc::new(RecordingCompletion {
            fail: true,
            ..Default::default()
        });
        let service = service_with(vec![("doc-a", vec!["text to summarize"])], completion).await;

        let error = service.extract_themes("text", 2).await.unwrap_err();
        assert!(matches!(error, ThemeError::Completion(_)));
    }
}
