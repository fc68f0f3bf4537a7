//! HTTP client wrapper implementing the vector index on top of Qdrant's REST API.

use crate::index::{IndexError, SearchResult, VectorIndex, check_dimension, check_upsert, point_id};
use crate::qdrant::{
    payload::{build_payload, search_result_from_payload},
    types::{CollectionInfoResponse, QdrantError, QueryResponse, QueryResponseResult},
};
use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::json;
use tokio::sync::OnceCell;

/// Qdrant-backed [`VectorIndex`] bound to a single named collection.
pub struct QdrantIndex {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
    pub(crate) collection: String,
    /// Vector size of the collection, resolved once. Initialization goes through this cell so
    /// concurrent first-time callers create the collection at most once.
    pub(crate) dimension: OnceCell<usize>,
}

impl QdrantIndex {
    /// Construct a client for `collection` on the Qdrant instance at `url`.
    pub fn new(
        url: &str,
        collection: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self, QdrantError> {
        let client = Client::builder().user_agent("docsift/0.1").build()?;
        let base_url = normalize_base_url(url).map_err(QdrantError::InvalidUrl)?;
        let collection = collection.into();
        tracing::debug!(
            url = %base_url,
            collection = %collection,
            has_api_key = api_key.as_deref().is_some_and(|value| !value.is_empty()),
            "Initialized Qdrant HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            api_key,
            collection,
            dimension: OnceCell::new(),
        })
    }

    /// Name of the collection this index writes to.
    pub fn collection_name(&self) -> &str {
        &self.collection
    }

    async fn create_collection(&self, vector_size: usize) -> Result<(), QdrantError> {
        let body = json!({
            "vectors": {
                "size": vector_size,
                "distance": "Cosine"
            }
        });

        let response = self
            .request(Method::PUT, &format!("collections/{}", self.collection))
            .json(&body)
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::info!(
                collection = %self.collection,
                vector_size,
                "Created collection"
            );
        })
        .await
    }

    /// Fetch the configured vector size, or `None` when the collection is missing.
    async fn collection_vector_size(&self) -> Result<Option<usize>, QdrantError> {
        let response = self
            .request(Method::GET, &format!("collections/{}", self.collection))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let info: CollectionInfoResponse = response.json().await?;
                let vectors = &info.result.config.params.vectors;
                match vectors.size() {
                    Some(size) => Ok(Some(size)),
                    None => {
                        tracing::error!(
                            collection = %self.collection,
                            named_vectors = ?vectors.names(),
                            "Collection uses named vectors; expected a single unnamed vector"
                        );
                        Err(QdrantError::UnsupportedVectors(self.collection.clone()))
                    }
                }
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = QdrantError::UnexpectedStatus { status, body };
                tracing::error!(collection = %self.collection, error = %error, "Collection lookup failed");
                Err(error)
            }
        }
    }

    /// Collection size from the cache, falling back to a lookup that does not create anything.
    async fn configured_dimension(&self) -> Result<Option<usize>, QdrantError> {
        if let Some(size) = self.dimension.get() {
            return Ok(Some(*size));
        }
        let size = self.collection_vector_size().await?;
        if let Some(size) = size {
            let _ = self.dimension.set(size);
        }
        Ok(size)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format_endpoint(&self.base_url, path);
        let mut req = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.header("api-key", api_key);
        }
        req
    }

    async fn ensure_success<F>(
        &self,
        response: reqwest::Response,
        on_success: F,
    ) -> Result<(), QdrantError>
    where
        F: FnOnce(),
    {
        if response.status().is_success() {
            on_success();
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(collection = %self.collection, error = %error, "Qdrant request failed");
            Err(error)
        }
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn ensure_collection(&self, vector_size: usize) -> Result<(), IndexError> {
        let configured = self
            .dimension
            .get_or_try_init(|| async {
                match self.collection_vector_size().await? {
                    Some(existing) => {
                        tracing::debug!(
                            collection = %self.collection,
                            vector_size = existing,
                            "Collection already exists"
                        );
                        Ok::<usize, QdrantError>(existing)
                    }
                    None => {
                        self.create_collection(vector_size).await?;
                        Ok(vector_size)
                    }
                }
            })
            .await?;

        if *configured != vector_size {
            tracing::warn!(
                collection = %self.collection,
                configured = *configured,
                requested = vector_size,
                "Collection exists with a different vector size"
            );
        }
        Ok(())
    }

    async fn upsert(
        &self,
        document_id: &str,
        chunks: &[String],
        vectors: &[Vec<f32>],
    ) -> Result<usize, IndexError> {
        let expected = self
            .configured_dimension()
            .await?
            .ok_or_else(|| IndexError::MissingCollection(self.collection.clone()))?;
        check_upsert(expected, chunks, vectors)?;
        if chunks.is_empty() {
            return Ok(0);
        }

        let points: Vec<_> = chunks
            .iter()
            .zip(vectors)
            .enumerate()
            .map(|(chunk_index, (text, vector))| {
                json!({
                    "id": point_id(document_id, chunk_index).to_string(),
                    "vector": vector,
                    "payload": build_payload(document_id, chunk_index, text),
                })
            })
            .collect();

        let point_count = points.len();
        let response = self
            .request(
                Method::PUT,
                &format!("collections/{}/points", self.collection),
            )
            .query(&[("wait", true)])
            .json(&json!({ "points": points }))
            .send()
            .await
            .map_err(QdrantError::from)?;

        self.ensure_success(response, || {
            tracing::debug!(
                collection = %self.collection,
                document_id,
                points = point_count,
                "Points upserted"
            );
        })
        .await?;

        Ok(point_count)
    }

    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>, IndexError> {
        let Some(expected) = self.configured_dimension().await? else {
            tracing::debug!(collection = %self.collection, "Search before collection exists");
            return Ok(Vec::new());
        };
        check_dimension(expected, query_vector)?;

        let body = json!({
            "query": query_vector,
            "limit": top_k,
            "with_payload": true,
        });

        let response = self
            .request(
                Method::POST,
                &format!("collections/{}/points/query", self.collection),
            )
            .json(&body)
            .send()
            .await
            .map_err(QdrantError::from)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = QdrantError::UnexpectedStatus { status, body };
            tracing::error!(collection = %self.collection, error = %error, "Qdrant search failed");
            return Err(error.into());
        }

        let payload: QueryResponse = response.json().await.map_err(QdrantError::from)?;
        let points = match payload.result {
            QueryResponseResult::Points(points) => points,
            QueryResponseResult::Object { points } => points,
        };

        let results = points
            .into_iter()
            .filter_map(|point| {
                let id = point.id.clone();
                let result = search_result_from_payload(point.score, point.payload);
                if result.is_none() {
                    tracing::warn!(point = %id, "Skipping point with incomplete payload");
                }
                result
            })
            .collect();

        Ok(results)
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}
