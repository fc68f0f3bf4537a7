//! File storage and document metadata bookkeeping.
//!
//! Uploaded bytes are written under `<data_dir>/uploads/<uuid><ext>`. Metadata records are
//! kept as a JSON list in `<data_dir>/metadata.json`; writes are serialized behind an async
//! mutex and replace the file atomically through a temporary sibling.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

/// Errors raised by the storage collaborators.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem access failed.
    #[error("Storage I/O failed for {path}: {source}")]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The metadata file could not be encoded or decoded.
    #[error("Metadata file is malformed: {0}")]
    Serde(#[from] serde_json::Error),
}

impl StorageError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Metadata emitted after a document has been indexed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Identifier assigned at ingestion.
    pub document_id: String,
    /// Original filename supplied by the uploader.
    pub filename: String,
    /// Number of chunks written to the index.
    pub chunk_count: usize,
    /// RFC3339 ingestion timestamp.
    pub ingested_at: String,
}

/// Persists raw uploaded bytes.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Store `bytes` under a fresh name derived from `filename`, returning the stored path.
    async fn save(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf, StorageError>;
}

/// Append-only list of [`DocumentRecord`]s.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Append a record.
    async fn append(&self, record: DocumentRecord) -> Result<(), StorageError>;
    /// All records, oldest first.
    async fn list(&self) -> Result<Vec<DocumentRecord>, StorageError>;
}

/// [`DocumentStore`] writing into a local directory.
#[derive(Debug, Clone)]
pub struct LocalDocumentStore {
    root: PathBuf,
}

impl LocalDocumentStore {
    /// Store files under `root`, created on first save.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory receiving uploads.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl DocumentStore for LocalDocumentStore {
    async fn save(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf, StorageError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|error| StorageError::io(&self.root, error))?;

        let stored_name = match Path::new(filename).extension().and_then(|ext| ext.to_str()) {
            Some(ext) => format!("{}.{}", Uuid::new_v4(), ext.to_ascii_lowercase()),
            None => Uuid::new_v4().to_string(),
        };
        let path = self.root.join(stored_name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|error| StorageError::io(&path, error))?;
        tracing::debug!(filename, path = %path.display(), bytes = bytes.len(), "Stored upload");
        Ok(path)
    }
}

/// [`MetadataStore`] backed by a JSON file.
#[derive(Debug)]
pub struct JsonMetadataStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonMetadataStore {
    /// Use the JSON list at `path`; a missing file reads as empty.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn read_all(&self) -> Result<Vec<DocumentRecord>, StorageError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(error) => Err(StorageError::io(&self.path, error)),
        }
    }
}

#[async_trait]
impl MetadataStore for JsonMetadataStore {
    async fn append(&self, record: DocumentRecord) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.read_all().await?;
        records.push(record);

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|error| StorageError::io(parent, error))?;
        }

        let encoded = serde_json::to_vec_pretty(&records)?;
        let staging = self.path.with_extension("json.tmp");
        tokio::fs::write(&staging, encoded)
            .await
            .map_err(|error| StorageError::io(&staging, error))?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .map_err(|error| StorageError::io(&self.path, error))?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<DocumentRecord>, StorageError> {
        let _guard = self.write_lock.lock().await;
        self.read_all().await
    }
}

/// Process-local [`MetadataStore`].
#[derive(Debug, Default)]
pub struct InMemoryMetadataStore {
    records: RwLock<Vec<DocumentRecord>>,
}

impl InMemoryMetadataStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn append(&self, record: DocumentRecord) -> Result<(), StorageError> {
        self.records.write().await.push(record);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<DocumentRecord>, StorageError> {
        Ok(self.records.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, filename: &str) -> DocumentRecord {
        DocumentRecord {
            document_id: id.into(),
            filename: filename.into(),
            chunk_count: 1,
            ingested_at: "2024-01-01T00:00:00Z".into(),
        }
    }

    #[tokio::test]
    async fn local_store_writes_uuid_named_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalDocumentStore::new(dir.path().join("uploads"));

        let first = store.save("Scan.PNG", b"one").await.expect("save");
        let second = store.save("Scan.PNG", b"two").await.expect("save");

        assert_ne!(first, second);
        assert_eq!(first.extension().and_then(|ext| ext.to_str()), Some("png"));
        let stem = first.file_stem().and_then(|stem| stem.to_str()).unwrap();
        assert!(Uuid::parse_str(stem).is_ok());
        assert_eq!(tokio::fs::read(&first).await.unwrap(), b"one");

        let bare = store.save("README", b"x").await.expect("save");
        assert!(bare.extension().is_none());
    }

    #[tokio::test]
    async fn json_store_appends_and_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("metadata.json");
        let store = JsonMetadataStore::new(&path);

        assert!(store.list().await.unwrap().is_empty());
        store.append(record("a", "a.pdf")).await.unwrap();
        store.append(record("b", "b.png")).await.unwrap();

        let reopened = JsonMetadataStore::new(&path);
        let records = reopened.list().await.unwrap();
        assert_eq!(records, vec![record("a", "a.pdf"), record("b", "b.png")]);
    }

    #[tokio::test]
    async fn json_store_reports_malformed_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("metadata.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let error = JsonMetadataStore::new(&path).list().await.unwrap_err();
        assert!(matches!(error, StorageError::Serde(_)));
    }

    #[tokio::test]
    async fn concurrent_appends_are_not_lost() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = std::sync::Arc::new(JsonMetadataStore::new(dir.path().join("metadata.json")));

        let tasks: Vec<_> = (0..8)
            .map(|index| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .append(record(&index.to_string(), "file.pdf"))
                        .await
                        .unwrap();
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(store.list().await.unwrap().len(), 8);
    }
}
