//! Core data types and error definitions for the processing pipeline.

use crate::{
    completion::CompletionError, embedding::EmbeddingClientError, extraction::ExtractionError,
    index::IndexError, qdrant::QdrantError, storage::StorageError,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while turning raw text into chunks.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Ingestion configured an impossible word budget.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
}

/// Errors emitted while ingesting a single document.
#[derive(Debug, Error)]
pub enum IngestError {
    /// File is neither a PDF nor a supported image.
    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),
    /// Extraction finished without producing any text.
    #[error("{}", no_text_message(filename, reason.as_deref()))]
    NoTextExtracted {
        /// Uploaded filename.
        filename: String,
        /// Failure cause when extraction failed outright rather than finding nothing.
        reason: Option<String>,
    },
    /// Chunking step failed to segment the document.
    #[error("Failed to chunk document: {0}")]
    Chunking(#[from] ChunkingError),
    /// Embedding provider failed to produce vectors for the chunks.
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Vector index rejected the write.
    #[error("Vector index request failed: {0}")]
    Index(#[from] IndexError),
    /// Upload or metadata storage failed.
    #[error("Storage failed: {0}")]
    Storage(#[from] StorageError),
}

fn no_text_message(filename: &str, reason: Option<&str>) -> String {
    match reason {
        Some(reason) => format!("No text could be extracted from {filename}: {reason}"),
        None => format!("No text could be extracted from {filename}"),
    }
}

impl From<ExtractionError> for IngestError {
    fn from(error: ExtractionError) -> Self {
        match error {
            ExtractionError::UnsupportedType(name) => Self::UnsupportedType(name),
        }
    }
}

/// Errors emitted while answering a similarity query.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Query text was blank.
    #[error("Query text must not be empty")]
    EmptyQuery,
    /// Embedding provider failed to return a vector for the query.
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Embedding provider returned no vectors.
    #[error("Embedding provider returned no vectors for the query")]
    EmptyEmbedding,
    /// Vector index search failed.
    #[error("Vector index request failed: {0}")]
    Index(#[from] IndexError),
}

/// Errors emitted while extracting themes.
#[derive(Debug, Error)]
pub enum ThemeError {
    /// Candidate retrieval failed, including blank query text.
    #[error(transparent)]
    Query(#[from] QueryError),
    /// Re-embedding the candidate texts failed.
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// The completion provider failed to summarize a cluster.
    #[error("Failed to summarize theme: {0}")]
    Completion(#[from] CompletionError),
}

/// Errors raised while wiring the production collaborators.
#[derive(Debug, Error)]
pub enum SetupError {
    /// The Qdrant backend was selected without a URL.
    #[error("QDRANT_URL must be set when VECTOR_BACKEND=qdrant")]
    MissingQdrantUrl,
    /// Embedding client could not be built.
    #[error("Failed to initialize embedding client: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Completion client could not be built.
    #[error("Failed to initialize completion client: {0}")]
    Completion(#[from] CompletionError),
    /// Qdrant client could not be built.
    #[error("Failed to initialize Qdrant client: {0}")]
    Qdrant(#[from] QdrantError),
}

/// Raw document handed to the ingestion pipeline.
#[derive(Debug, Clone)]
pub struct Upload {
    /// Filename supplied by the uploader, used for classification.
    pub filename: String,
    /// Optional MIME type, consulted when the filename has no extension.
    pub content_type: Option<String>,
    /// File contents.
    pub bytes: Vec<u8>,
}

impl Upload {
    /// Upload without a content type.
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            content_type: None,
            bytes: bytes.into(),
        }
    }

    /// Attach a MIME type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Summary of a successfully indexed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestOutcome {
    /// Identifier assigned to the document.
    pub document_id: String,
    /// Uploaded filename.
    pub filename: String,
    /// Number of chunks written to the index.
    pub chunk_count: usize,
}

/// Per-file result of a batch ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BatchEntry {
    /// File was indexed.
    Indexed(IngestOutcome),
    /// File failed; the rest of the batch was unaffected.
    Failed {
        /// Uploaded filename.
        filename: String,
        /// Human-readable failure message.
        error: String,
    },
}

impl BatchEntry {
    /// Filename the entry refers to.
    pub fn filename(&self) -> &str {
        match self {
            Self::Indexed(outcome) => &outcome.filename,
            Self::Failed { filename, .. } => filename,
        }
    }

    /// Failure message, if the file failed.
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Indexed(_) => None,
            Self::Failed { error, .. } => Some(error),
        }
    }
}

/// Summary of one cluster of related chunks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    /// Natural-language summary produced by the completion provider.
    pub summary: String,
    /// Distinct documents contributing to the cluster, in retrieval order.
    pub document_ids: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn batch_entries_serialize_flat() {
        let indexed = BatchEntry::Indexed(IngestOutcome {
            document_id: "doc".into(),
            filename: "scan.pdf".into(),
            chunk_count: 2,
        });
        let failed = BatchEntry::Failed {
            filename: "notes.txt".into(),
            error: "Unsupported file type: notes.txt".into(),
        };

        assert_eq!(
            serde_json::to_value(&indexed).unwrap(),
            json!({ "document_id": "doc", "filename": "scan.pdf", "chunk_count": 2 })
        );
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            json!({ "filename": "notes.txt", "error": "Unsupported file type: notes.txt" })
        );
        assert_eq!(failed.filename(), "notes.txt");
        assert!(indexed.error().is_none());
    }

    #[test]
    fn extraction_errors_map_to_unsupported_type() {
        let error: IngestError = ExtractionError::UnsupportedType("a.docx".into()).into();
        assert_eq!(error.to_string(), "Unsupported file type: a.docx");
    }
}
