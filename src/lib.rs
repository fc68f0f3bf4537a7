#![deny(missing_docs)]

//! Core library for docsift: document ingestion, semantic retrieval, and theme extraction.

/// HTTP routing and REST handlers.
pub mod api;
/// Chat completion clients for theme summaries.
pub mod completion;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Text extraction from PDFs and images.
pub mod extraction;
/// Vector index abstraction and the in-memory backend.
pub mod index;
/// Structured logging and tracing setup.
pub mod logging;
/// Ingestion metrics helpers.
pub mod metrics;
/// Document processing pipeline utilities.
pub mod processing;
/// Qdrant vector store integration.
pub mod qdrant;
/// Upload storage and document metadata.
pub mod storage;
