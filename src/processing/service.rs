//! Processing service wiring the ingestion, retrieval, and theme pipelines together.

use crate::{
    completion::{CompletionClient, build_completion_client},
    config::{Config, VectorBackend},
    embedding::{EmbeddingClient, build_embedding_client},
    extraction::TextExtractor,
    index::{InMemoryIndex, SearchResult, VectorIndex},
    metrics::{IngestMetrics, MetricsSnapshot},
    processing::{
        ingest::{IngestDeps, IngestService},
        retrieval::RetrievalService,
        themes::{ThemeService, ThemeSettings},
        types::{
            BatchEntry, IngestError, IngestOutcome, QueryError, SetupError, Theme, ThemeError,
            Upload,
        },
    },
    qdrant::QdrantIndex,
    storage::{
        DocumentRecord, DocumentStore, JsonMetadataStore, LocalDocumentStore, MetadataStore,
        StorageError,
    },
};
use async_trait::async_trait;
use std::sync::Arc;

/// Abstraction over the processing pipeline used by external surfaces (HTTP, CLI).
#[async_trait]
pub trait ProcessingApi: Send + Sync {
    /// Extract, chunk, embed, and index one uploaded document.
    async fn ingest(&self, upload: Upload) -> Result<IngestOutcome, IngestError>;

    /// Ingest several documents, isolating failures per file.
    async fn ingest_batch(&self, uploads: Vec<Upload>) -> Vec<BatchEntry>;

    /// Similarity search; `None` uses the configured default `top_k`.
    async fn query(
        &self,
        text: &str,
        top_k: Option<usize>,
    ) -> Result<Vec<SearchResult>, QueryError>;

    /// Theme extraction; `None` uses the configured default cluster count.
    async fn themes(
        &self,
        text: &str,
        cluster_count: Option<usize>,
    ) -> Result<Vec<Theme>, ThemeError>;

    /// Records of every indexed document.
    async fn list_documents(&self) -> Result<Vec<DocumentRecord>, StorageError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Limits and defaults applied by [`ProcessingService`].
#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    /// Maximum words per chunk.
    pub max_words: usize,
    /// Files processed concurrently in a batch.
    pub batch_concurrency: usize,
    /// `top_k` used when a query does not specify one.
    pub default_top_k: usize,
    /// Upper bound for caller supplied `top_k`.
    pub max_top_k: usize,
    /// Candidates retrieved before theme clustering.
    pub theme_candidates: usize,
    /// Cluster count used when a theme request does not specify one.
    pub theme_clusters: usize,
    /// Clustering seed.
    pub theme_seed: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_words: 512,
            batch_concurrency: 4,
            default_top_k: 5,
            max_top_k: 100,
            theme_candidates: 15,
            theme_clusters: 3,
            theme_seed: 42,
        }
    }
}

impl PipelineSettings {
    /// Settings taken from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_words: config.chunk_max_words,
            batch_concurrency: config.batch_concurrency,
            default_top_k: config.search_top_k,
            max_top_k: config.search_max_top_k,
            theme_candidates: config.theme_candidates,
            theme_clusters: config.theme_clusters,
            theme_seed: config.theme_seed,
        }
    }
}

/// Long-lived collaborators shared by every pipeline.
#[derive(Clone)]
pub struct Components {
    /// Text extraction engine.
    pub extractor: TextExtractor,
    /// Embedding provider.
    pub embedder: Arc<dyn EmbeddingClient>,
    /// Vector index.
    pub index: Arc<dyn VectorIndex>,
    /// Completion provider for theme summaries.
    pub completion: Arc<dyn CompletionClient>,
    /// Raw upload storage.
    pub documents: Arc<dyn DocumentStore>,
    /// Document record list.
    pub metadata: Arc<dyn MetadataStore>,
}

/// Coordinates ingestion, retrieval, and theme extraction over one set of collaborators.
///
/// Construct once near process start and share it through an `Arc`.
pub struct ProcessingService {
    ingest: IngestService,
    retrieval: RetrievalService,
    themes: ThemeService,
    metadata: Arc<dyn MetadataStore>,
    metrics: Arc<IngestMetrics>,
    settings: PipelineSettings,
}

impl ProcessingService {
    /// Assemble the service from explicit collaborators.
    pub fn new(components: Components, settings: PipelineSettings) -> Self {
        let Components {
            extractor,
            embedder,
            index,
            completion,
            documents,
            metadata,
        } = components;
        let metrics = Arc::new(IngestMetrics::new());

        let ingest = IngestService::new(IngestDeps {
            extractor,
            embedder: embedder.clone(),
            index: index.clone(),
            documents,
            metadata: metadata.clone(),
            metrics: metrics.clone(),
            max_words: settings.max_words,
            batch_concurrency: settings.batch_concurrency,
        });
        let retrieval = RetrievalService::new(embedder.clone(), index, settings.max_top_k);
        let themes = ThemeService::new(
            retrieval.clone(),
            embedder,
            completion,
            ThemeSettings {
                candidates: settings.theme_candidates,
                seed: settings.theme_seed,
            },
        );

        Self {
            ingest,
            retrieval,
            themes,
            metadata,
            metrics,
            settings,
        }
    }

    /// Wire the production collaborators described by `config`.
    pub fn from_config(config: &Config) -> Result<Self, SetupError> {
        tracing::info!("Initializing embedding client");
        let embedder = build_embedding_client(config)?;
        let completion = build_completion_client(config)?;

        let index: Arc<dyn VectorIndex> = match config.vector_backend {
            VectorBackend::Qdrant => {
                let url = config
                    .qdrant_url
                    .as_deref()
                    .ok_or(SetupError::MissingQdrantUrl)?;
                Arc::new(QdrantIndex::new(
                    url,
                    config.qdrant_collection_name.clone(),
                    config.qdrant_api_key.clone(),
                )?)
            }
            VectorBackend::Memory => {
                tracing::warn!("Using in-memory vector index; data is lost on restart");
                Arc::new(InMemoryIndex::new(config.qdrant_collection_name.clone()))
            }
        };

        let components = Components {
            extractor: TextExtractor::from_config(config),
            embedder,
            index,
            completion,
            documents: Arc::new(LocalDocumentStore::new(config.data_dir.join("uploads"))),
            metadata: Arc::new(JsonMetadataStore::new(config.data_dir.join("metadata.json"))),
        };
        tracing::debug!(
            backend = ?config.vector_backend,
            data_dir = %config.data_dir.display(),
            "Processing service ready"
        );
        Ok(Self::new(components, PipelineSettings::from_config(config)))
    }
}

#[async_trait]
impl ProcessingApi for ProcessingService {
    async fn ingest(&self, upload: Upload) -> Result<IngestOutcome, IngestError> {
        self.ingest.ingest(upload).await
    }

    async fn ingest_batch(&self, uploads: Vec<Upload>) -> Vec<BatchEntry> {
        self.ingest.ingest_batch(uploads).await
    }

    async fn query(
        &self,
        text: &str,
        top_k: Option<usize>,
    ) -> Result<Vec<SearchResult>, QueryError> {
        let top_k = top_k.unwrap_or(self.settings.default_top_k);
        self.retrieval.query(text, top_k).await
    }

    async fn themes(
        &self,
        text: &str,
        cluster_count: Option<usize>,
    ) -> Result<Vec<Theme>, ThemeError> {
        let cluster_count = cluster_count.unwrap_or(self.settings.theme_clusters);
        self.themes.extract_themes(text, cluster_count).await
    }

    async fn list_documents(&self) -> Result<Vec<DocumentRecord>, StorageError> {
        self.metadata.list().await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
