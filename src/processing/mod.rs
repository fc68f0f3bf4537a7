//! Document processing pipeline: extraction, chunking, embedding, indexing, retrieval, and
//! theme clustering.

pub mod chunking;
mod ingest;
mod kmeans;
mod retrieval;
mod service;
mod themes;
pub mod types;

pub use ingest::{IngestDeps, IngestService};
pub use retrieval::RetrievalService;
pub use service::{Components, PipelineSettings, ProcessingApi, ProcessingService};
pub use themes::{ThemeService, ThemeSettings};
pub use types::{
    BatchEntry, ChunkingError, IngestError, IngestOutcome, QueryError, SetupError, Theme,
    ThemeError, Upload,
};
