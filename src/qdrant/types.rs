//! Shared types used by the Qdrant client and helpers.

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors returned while interacting with Qdrant.
#[derive(Debug, Error)]
pub enum QdrantError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid Qdrant URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Qdrant responded with an unexpected status code.
    #[error("Unexpected Qdrant response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from Qdrant.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Collection exists but its vector configuration could not be interpreted.
    #[error("Unsupported vector configuration on collection '{0}'")]
    UnsupportedVectors(String),
}

#[derive(Deserialize)]
pub(crate) struct CollectionInfoResponse {
    pub(crate) result: CollectionInfo,
}

#[derive(Deserialize)]
pub(crate) struct CollectionInfo {
    pub(crate) config: CollectionConfig,
}

#[derive(Deserialize)]
pub(crate) struct CollectionConfig {
    pub(crate) params: CollectionParams,
}

#[derive(Deserialize)]
pub(crate) struct CollectionParams {
    pub(crate) vectors: VectorsConfig,
}

#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum VectorsConfig {
    Single(VectorParams),
    Named(BTreeMap<String, VectorParams>),
}

#[derive(Deserialize)]
pub(crate) struct VectorParams {
    pub(crate) size: usize,
}

impl VectorsConfig {
    /// Size of the unnamed vector. Named vectors are not addressed by upsert or query.
    pub(crate) fn size(&self) -> Option<usize> {
        match self {
            Self::Single(params) => Some(params.size),
            Self::Named(_) => None,
        }
    }

    /// Names of the configured named vectors; empty for the unnamed layout.
    pub(crate) fn names(&self) -> Vec<&str> {
        match self {
            Self::Single(_) => Vec::new(),
            Self::Named(named) => named.keys().map(String::as_str).collect(),
        }
    }
}

#[derive(Deserialize)]
pub(crate) struct QueryResponse {
    pub(crate) result: QueryResponseResult,
}

#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum QueryResponseResult {
    Points(Vec<QueryPoint>),
    Object {
        #[serde(default)]
        points: Vec<QueryPoint>,
    },
}

#[derive(Deserialize)]
pub(crate) struct QueryPoint {
    #[serde(default)]
    pub(crate) id: Value,
    pub(crate) score: f32,
    #[serde(default)]
    pub(crate) payload: Option<Map<String, Value>>,
}
