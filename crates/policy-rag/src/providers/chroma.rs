//! Chroma vector store provider (REST API v2)

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::config::{ChromaConfig, DistanceMetric};
use crate::error::{Error, Result};
use crate::types::Chunk;

use super::http::{build_client, check_status};
use super::vector_store::{VectorSearchResult, VectorStoreProvider};

const SERVICE: &str = "chroma";

/// Records per add request
const ADD_BATCH: usize = 500;

#[derive(Deserialize)]
struct CollectionInfo {
    id: String,
}

#[derive(Serialize)]
struct AddRequest<'a> {
    ids: Vec<String>,
    embeddings: Vec<&'a [f32]>,
    documents: Vec<&'a str>,
    metadatas: Vec<Map<String, Value>>,
}

#[derive(Serialize)]
struct QueryRequest<'a> {
    query_embeddings: [&'a [f32]; 1],
    n_results: usize,
    include: [&'static str; 3],
}

#[derive(Deserialize)]
struct QueryResponse {
    ids: Vec<Vec<String>>,
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<Map<String, Value>>>>>,
    #[serde(default)]
    distances: Option<Vec<Vec<Option<f32>>>>,
}

impl QueryResponse {
    /// Results for the first (only) query embedding
    fn into_results(self, metric: DistanceMetric) -> Vec<VectorSearchResult> {
        let ids = self.ids.into_iter().next().unwrap_or_default();
        let documents = self
            .documents
            .and_then(|d| d.into_iter().next())
            .unwrap_or_default();
        let metadatas = self
            .metadatas
            .and_then(|m| m.into_iter().next())
            .unwrap_or_default();
        let distances = self
            .distances
            .and_then(|d| d.into_iter().next())
            .unwrap_or_default();

        let empty = Map::new();
        ids.iter()
            .enumerate()
            .map(|(i, id)| {
                let content = documents.get(i).cloned().flatten().unwrap_or_default();
                let metadata = metadatas.get(i).and_then(|m| m.as_ref()).unwrap_or(&empty);
                let distance = distances.get(i).copied().flatten().unwrap_or(f32::MAX);
                VectorSearchResult {
                    chunk: Chunk::from_vector_metadata(id, content, metadata),
                    similarity: metric.similarity_from_distance(distance),
                }
            })
            .collect()
    }
}

/// Vector store backed by a Chroma collection
///
/// The collection is created on first use with the configured
/// `hnsw:space`, and its id is cached until the next reset.
pub struct ChromaVectorStore {
    client: Client,
    base_url: String,
    config: ChromaConfig,
    metric: DistanceMetric,
    collection_id: RwLock<Option<String>>,
}

impl ChromaVectorStore {
    /// Create a new Chroma store; no request is made until first use
    pub fn new(config: &ChromaConfig, metric: DistanceMetric, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            base_url: config.url.trim_end_matches('/').to_string(),
            config: config.clone(),
            metric,
            collection_id: RwLock::new(None),
        })
    }

    fn collections_url(&self) -> String {
        format!(
            "{}/api/v2/tenants/{}/databases/{}/collections",
            self.base_url, self.config.tenant, self.config.database
        )
    }

    fn collection_url(&self, id: &str, action: &str) -> String {
        format!("{}/{}/{}", self.collections_url(), id, action)
    }

    async fn collection_id(&self) -> Result<String> {
        let cached = self.collection_id.read().clone();
        if let Some(id) = cached {
            return Ok(id);
        }

        let response = self
            .client
            .post(self.collections_url())
            .json(&json!({
                "name": self.config.collection,
                "metadata": { "hnsw:space": self.metric.chroma_space() },
                "get_or_create": true,
            }))
            .send()
            .await?;

        let info: CollectionInfo = check_status(SERVICE, response).await?.json().await?;
        tracing::debug!(
            "Using Chroma collection '{}' ({})",
            self.config.collection,
            info.id
        );
        *self.collection_id.write() = Some(info.id.clone());
        Ok(info.id)
    }
}

#[async_trait]
impl VectorStoreProvider for ChromaVectorStore {
    async fn insert_chunks(&self, chunks: &[Chunk]) -> Result<()> {
        if let Some(chunk) = chunks.iter().find(|c| c.embedding.is_empty()) {
            return Err(Error::vector_db(format!("Chunk {} has no embedding", chunk.id)));
        }

        let id = self.collection_id().await?;
        for batch in chunks.chunks(ADD_BATCH) {
            let request = AddRequest {
                ids: batch.iter().map(|c| c.id.to_string()).collect(),
                embeddings: batch.iter().map(|c| c.embedding.as_slice()).collect(),
                documents: batch.iter().map(|c| c.content.as_str()).collect(),
                metadatas: batch.iter().map(|c| c.to_vector_metadata()).collect(),
            };
            let response = self
                .client
                .post(self.collection_url(&id, "add"))
                .json(&request)
                .send()
                .await?;
            check_status(SERVICE, response).await?;
        }

        tracing::debug!("Added {} chunks to Chroma", chunks.len());
        Ok(())
    }

    async fn search(&self, query_embedding: &[f32], top_k: usize) -> Result<Vec<VectorSearchResult>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let id = self.collection_id().await?;
        let response = self
            .client
            .post(self.collection_url(&id, "query"))
            .json(&QueryRequest {
                query_embeddings: [query_embedding],
                n_results: top_k,
                include: ["documents", "metadatas", "distances"],
            })
            .send()
            .await?;

        let body: QueryResponse = check_status(SERVICE, response).await?.json().await?;
        Ok(body.into_results(self.metric))
    }

    async fn reset(&self) -> Result<()> {
        let response = self
            .client
            .delete(format!("{}/{}", self.collections_url(), self.config.collection))
            .send()
            .await?;

        // A collection that never existed is already empty
        if response.status().as_u16() != 404 {
            check_status(SERVICE, response).await?;
        }
        *self.collection_id.write() = None;
        tracing::info!("Reset Chroma collection '{}'", self.config.collection);
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        let id = self.collection_id().await?;
        let response = self
            .client
            .get(self.collection_url(&id, "count"))
            .send()
            .await?;
        Ok(check_status(SERVICE, response).await?.json().await?)
    }

    async fn health_check(&self) -> Result<bool> {
        let response = self
            .client
            .get(format!("{}/api/v2/heartbeat", self.base_url))
            .send()
            .await?;
        Ok(response.status().is_success())
    }

    fn name(&self) -> &str {
        SERVICE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_response_to_results() {
        let body: QueryResponse = serde_json::from_value(json!({
            "ids": [["6f1c5d2e-8a4b-4c3d-9e2f-1a2b3c4d5e6f", "other"]],
            "documents": [["Uniforms are required.", null]],
            "metadatas": [[{"source": "handbook.pdf", "page": 2, "chunk_index": 0}, null]],
            "distances": [[0.0, 1.0]],
            "embeddings": null
        }))
        .unwrap();

        let results = body.into_results(DistanceMetric::L2);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.content, "Uniforms are required.");
        assert_eq!(results[0].chunk.source.filename, "handbook.pdf");
        assert_eq!(results[0].chunk.source.page_number, Some(2));
        assert_eq!(results[0].similarity, 1.0);
        assert_eq!(results[1].similarity, 0.5);
        assert_eq!(results[1].chunk.source.filename, "document");
    }

    #[test]
    fn test_empty_query_response() {
        let body: QueryResponse = serde_json::from_value(json!({ "ids": [] })).unwrap();
        assert!(body.into_results(DistanceMetric::Cosine).is_empty());
    }

    #[test]
    fn test_urls() {
        let store = ChromaVectorStore::new(&ChromaConfig::default(), DistanceMetric::L2, 5).unwrap();
        assert_eq!(
            store.collection_url("abc", "query"),
            "http://localhost:8000/api/v2/tenants/default_tenant/databases/default_database/collections/abc/query"
        );
    }
}
