//! Write path: classify, store, extract, chunk, embed, and index uploaded documents.

use crate::{
    embedding::EmbeddingClient,
    extraction::{DocumentKind, ExtractionOutcome, TextExtractor},
    index::VectorIndex,
    metrics::IngestMetrics,
    processing::{
        chunking::split_text,
        types::{BatchEntry, IngestError, IngestOutcome, Upload},
    },
    storage::{DocumentRecord, DocumentStore, MetadataStore},
};
use futures_util::{StreamExt, stream};
use std::sync::Arc;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use uuid::Uuid;

/// Collaborators and limits for [`IngestService`].
#[derive(Clone)]
pub struct IngestDeps {
    /// Text extraction engine.
    pub extractor: TextExtractor,
    /// Embedding provider for chunk vectors.
    pub embedder: Arc<dyn EmbeddingClient>,
    /// Vector index receiving the chunks.
    pub index: Arc<dyn VectorIndex>,
    /// Raw upload storage.
    pub documents: Arc<dyn DocumentStore>,
    /// Document record list.
    pub metadata: Arc<dyn MetadataStore>,
    /// Shared ingestion counters.
    pub metrics: Arc<IngestMetrics>,
    /// Maximum words per chunk.
    pub max_words: usize,
    /// Files processed concurrently by [`IngestService::ingest_batch`].
    pub batch_concurrency: usize,
}

/// Runs the ingestion pipeline for single uploads and batches.
#[derive(Clone)]
pub struct IngestService {
    deps: IngestDeps,
}

impl IngestService {
    /// Build the service from its collaborators.
    pub fn new(deps: IngestDeps) -> Self {
        Self { deps }
    }

    /// Ingest one document, stopping at the first failure.
    ///
    /// Side effects already performed (stored file, indexed points) are not rolled back.
    pub async fn ingest(&self, upload: Upload) -> Result<IngestOutcome, IngestError> {
        let filename = upload.filename.clone();
        match self.run(upload).await {
            Ok(outcome) => {
                self.deps.metrics.record_document(outcome.chunk_count as u64);
                tracing::info!(
                    filename = %outcome.filename,
                    document_id = %outcome.document_id,
                    chunks = outcome.chunk_count,
                    "Document indexed"
                );
                Ok(outcome)
            }
            Err(error) => {
                self.deps.metrics.record_failure();
                tracing::warn!(filename = %filename, error = %error, "Document ingestion failed");
                Err(error)
            }
        }
    }

    /// Ingest several documents concurrently, reporting one entry per input in input order.
    pub async fn ingest_batch(&self, uploads: Vec<Upload>) -> Vec<BatchEntry> {
        let total = uploads.len();
        let concurrency = self.deps.batch_concurrency.max(1);
        tracing::info!(files = total, concurrency, "Starting batch ingestion");

        let entries: Vec<BatchEntry> = stream::iter(uploads)
            .map(|upload| async move {
                let filename = upload.filename.clone();
                match self.ingest(upload).await {
                    Ok(outcome) => BatchEntry::Indexed(outcome),
                    Err(error) => BatchEntry::Failed {
                        filename,
                        error: error.to_string(),
                    },
                }
            })
            .buffered(concurrency)
            .collect()
            .await;

        let failed = entries.iter().filter(|entry| entry.error().is_some()).count();
        tracing::info!(files = total, failed, "Batch ingestion finished");
        entries
    }

    async fn run(&self, upload: Upload) -> Result<IngestOutcome, IngestError> {
        let Upload {
            filename,
            content_type,
            bytes,
        } = upload;

        let kind = DocumentKind::classify(&filename, content_type.as_deref())?;
        let stored = self.deps.documents.save(&filename, &bytes).await?;
        tracing::debug!(filename = %filename, ?kind, path = %stored.display(), "Upload stored");

        let text = match self.deps.extractor.extract(&bytes, kind).await {
            ExtractionOutcome::Extracted { text, .. } => text,
            ExtractionOutcome::Empty => {
                return Err(IngestError::NoTextExtracted {
                    filename,
                    reason: None,
                });
            }
            ExtractionOutcome::Failed { reason } => {
                return Err(IngestError::NoTextExtracted {
                    filename,
                    reason: Some(reason),
                });
            }
        };

        let chunks = split_text(&text, self.deps.max_words)?;
        if chunks.is_empty() {
            return Err(IngestError::NoTextExtracted {
                filename,
                reason: None,
            });
        }

        let vectors = self
            .deps
            .embedder
            .generate_embeddings(chunks.clone())
            .await?;
        if let Some(first) = vectors.first() {
            self.deps.index.ensure_collection(first.len()).await?;
        }

        let document_id = Uuid::new_v4().to_string();
        let written = self
            .deps
            .index
            .upsert(&document_id, &chunks, &vectors)
            .await?;
        tracing::debug!(document_id = %document_id, points = written, "Chunks upserted");

        let ingested_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        self.deps
            .metadata
            .append(DocumentRecord {
                document_id: document_id.clone(),
                filename: filename.clone(),
                chunk_count: chunks.len(),
                ingested_at,
            })
            .await?;

        Ok(IngestOutcome {
            document_id,
            filename,
            chunk_count: chunks.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        embedding::{EmbeddingClientError, HashingEmbedder},
        extraction::{OcrEngine, OcrError, PageRenderer, PdfError, TextLayerReader},
        index::InMemoryIndex,
        storage::{InMemoryMetadataStore, StorageError},
    };
    use async_trait::async_trait;
    use image::{DynamicImage, GrayImage, RgbImage};
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedOcr(&'static str);

    #[async_trait]
    impl OcrEngine for FixedOcr {
        async fn recognize(&self, _image: &GrayImage) -> Result<String, OcrError> {
            Ok(self.0.to_string())
        }
    }

    struct OnePage;

    impl PageRenderer for OnePage {
        fn render_pages(&self, _pdf: &[u8]) -> Result<Vec<DynamicImage>, PdfError> {
            Ok(vec![DynamicImage::ImageRgb8(RgbImage::new(8, 8))])
        }
    }

    struct NoLayer;

    impl TextLayerReader for NoLayer {
        fn read_pages(&self, _pdf: &[u8]) -> Result<Vec<String>, PdfError> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        saved: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DocumentStore for RecordingStore {
        async fn save(&self, filename: &str, _bytes: &[u8]) -> Result<PathBuf, StorageError> {
            self.saved.lock().unwrap().push(filename.to_string());
            Ok(PathBuf::from(format!("/virtual/{filename}")))
        }
    }

    struct CountingEmbedder {
        inner: HashingEmbedder,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingClient for CountingEmbedder {
        async fn generate_embeddings(
            &self,
            texts: Vec<String>,
        ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.generate_embeddings(texts).await
        }
    }

    struct Harness {
        service: IngestService,
        index: Arc<InMemoryIndex>,
        store: Arc<RecordingStore>,
        metadata: Arc<InMemoryMetadataStore>,
        embedder: Arc<CountingEmbedder>,
        metrics: Arc<IngestMetrics>,
    }

    struct MissingPdfium;

    impl PageRenderer for MissingPdfium {
        fn render_pages(&self, _pdf: &[u8]) -> Result<Vec<DynamicImage>, PdfError> {
            Err(PdfError::Library("libpdfium.so: cannot open shared object".into()))
        }
    }

    impl TextLayerReader for MissingPdfium {
        fn read_pages(&self, _pdf: &[u8]) -> Result<Vec<String>, PdfError> {
            Err(PdfError::Open("xref table is damaged".into()))
        }
    }

    fn harness(ocr_text: &'static str, max_words: usize) -> Harness {
        let extractor = TextExtractor::new(
            Arc::new(FixedOcr(ocr_text)),
            Arc::new(OnePage),
            Arc::new(NoLayer),
            2000,
        );
        harness_with(extractor, max_words)
    }

    fn harness_with(extractor: TextExtractor, max_words: usize) -> Harness {
        let index = Arc::new(InMemoryIndex::new("document_embeddings"));
        let store = Arc::new(RecordingStore::default());
        let metadata = Arc::new(InMemoryMetadataStore::new());
        let embedder = Arc::new(CountingEmbedder {
            inner: HashingEmbedder::new(64).unwrap(),
            calls: AtomicUsize::new(0),
        });
        let metrics = Arc::new(IngestMetrics::new());
        let service = IngestService::new(IngestDeps {
            extractor,
            embedder: embedder.clone(),
            index: index.clone(),
            documents: store.clone(),
            metadata: metadata.clone(),
            metrics: metrics.clone(),
            max_words,
            batch_concurrency: 2,
        });
        Harness {
            service,
            index,
            store,
            metadata,
            embedder,
            metrics,
        }
    }

    #[tokio::test]
    async fn ingest_indexes_chunks_and_records_metadata() {
        let harness = harness("alpha beta gamma delta epsilon", 2);

        let outcome = harness
            .service
            .ingest(Upload::new("scan.pdf", b"%PDF".to_vec()))
            .await
            .expect("ingest");

        assert_eq!(outcome.filename, "scan.pdf");
        assert_eq!(outcome.chunk_count, 3);
        assert!(Uuid::parse_str(&outcome.document_id).is_ok());
        assert_eq!(harness.index.len().await, 3);
        assert_eq!(harness.index.dimension().await, Some(64));

        let records = harness.metadata.list().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].document_id, outcome.document_id);
        assert_eq!(records[0].chunk_count, 3);
        assert!(!records[0].ingested_at.is_empty());

        let snapshot = harness.metrics.snapshot();
        assert_eq!(snapshot.documents_indexed, 1);
        assert_eq!(snapshot.chunks_indexed, 3);
    }

    #[tokio::test]
    async fn unsupported_files_fail_before_storage_or_embedding() {
        let harness = harness("ignored", 10);

        let error = harness
            .service
            .ingest(Upload::new("notes.txt", b"plain".to_vec()))
            .await
            .expect_err("unsupported");

        assert!(matches!(error, IngestError::UnsupportedType(ref name) if name == "notes.txt"));
        assert!(harness.store.saved.lock().unwrap().is_empty());
        assert_eq!(harness.embedder.calls.load(Ordering::SeqCst), 0);
        assert_eq!(harness.metrics.snapshot().ingest_failures, 1);
    }

    #[tokio::test]
    async fn empty_extraction_is_reported_without_indexing() {
        let harness = harness("   ", 10);

        let error = harness
            .service
            .ingest(Upload::new("blank.pdf", b"%PDF".to_vec()))
            .await
            .expect_err("no text");

        assert!(matches!(error, IngestError::NoTextExtracted { ref filename, .. } if filename == "blank.pdf"));
        assert!(harness.index.is_empty().await);
        assert!(harness.metadata.list().await.unwrap().is_empty());
        assert_eq!(harness.embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn batch_isolates_failures_and_keeps_input_order() {
        let harness = harness("some recognized words", 50);

        let entries = harness
            .service
            .ingest_batch(vec![
                Upload::new("first.pdf", b"%PDF".to_vec()),
                Upload::new("notes.txt", b"plain".to_vec()),
                Upload::new("upload", b"%PDF".to_vec()).with_content_type("application/pdf"),
            ])
            .await;

        let names: Vec<&str> = entries.iter().map(BatchEntry::filename).collect();
        assert_eq!(names, vec!["first.pdf", "notes.txt", "upload"]);
        assert!(matches!(entries[0], BatchEntry::Indexed(_)));
        assert!(entries[1].error().unwrap().contains("Unsupported file type"));
        assert!(matches!(entries[2], BatchEntry::Indexed(_)));
        assert_eq!(harness.metadata.list().await.unwrap().len(), 2);
        assert_eq!(harness.metrics.snapshot().ingest_failures, 1);
    }

    #[tokio::test]
    async fn failed_extraction_cause_reaches_batch_entries() {
        let harness = harness_with(
            TextExtractor::new(
                Arc::new(FixedOcr("unused")),
                Arc::new(MissingPdfium),
                Arc::new(MissingPdfium),
                2000,
            ),
            10,
        );

        let entries = harness
            .service
            .ingest_batch(vec![Upload::new("scan.pdf", b"%PDF".to_vec())])
            .await;

        let error = entries[0].error().expect("failed entry");
        assert!(error.starts_with("No text could be extracted from scan.pdf: "));
        assert!(error.contains("Failed to load PDFium library"));
        assert!(error.contains("xref table is damaged"));
        assert!(harness.index.is_empty().await);
    }

    #[test]
    fn empty_extraction_message_has_no_trailing_cause() {
        let error = IngestError::NoTextExtracted {
            filename: "blank.png".into(),
            reason: None,
        };
        assert_eq!(error.to_string(), "No text could be extracted from blank.png");
    }
}
