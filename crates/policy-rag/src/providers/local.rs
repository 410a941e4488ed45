//! Local vector store: a flat index persisted to the index directory

use async_trait::async_trait;
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::retrieval::FlatIndex;
use crate::types::Chunk;

use super::vector_store::{VectorSearchResult, VectorStoreProvider};

/// Local vector store wrapping a [`FlatIndex`]
///
/// Every mutation is written through to disk before it returns.
pub struct LocalVectorStore {
    index: Arc<RwLock<FlatIndex>>,
    dir: PathBuf,
}

impl LocalVectorStore {
    /// Wrap an existing index persisted under `dir`
    pub fn new(index: FlatIndex, dir: PathBuf) -> Self {
        Self {
            index: Arc::new(RwLock::new(index)),
            dir,
        }
    }

    /// Open the index directory from config
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        let dir = config.vector_db.index_dir.clone();
        let index = FlatIndex::load(&dir, config.embeddings.dimensions, config.vector_db.metric)?;
        Ok(Self::new(index, dir))
    }

    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(Arc<RwLock<FlatIndex>>, PathBuf) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let index = Arc::clone(&self.index);
        let dir = self.dir.clone();
        tokio::task::spawn_blocking(move || f(index, dir))
            .await
            .map_err(|e| Error::internal(format!("Task join error: {}", e)))?
    }
}

#[async_trait]
impl VectorStoreProvider for LocalVectorStore {
    async fn insert_chunks(&self, chunks: &[Chunk]) -> Result<()> {
        let chunks = chunks.to_vec();
        self.blocking(move |index, dir| {
            let mut index = index.write();
            index.insert(&chunks)?;
            index.save(&dir)
        })
        .await
    }

    async fn search(&self, query_embedding: &[f32], top_k: usize) -> Result<Vec<VectorSearchResult>> {
        let query = query_embedding.to_vec();
        self.blocking(move |index, _| index.read().search(&query, top_k))
            .await
    }

    async fn reset(&self) -> Result<()> {
        self.blocking(|index, dir| {
            let mut index = index.write();
            index.clear();
            index.save(&dir)
        })
        .await
    }

    async fn rebuild(&self, chunks: &[Chunk]) -> Result<()> {
        let chunks = chunks.to_vec();
        self.blocking(move |index, dir| {
            // Build and persist the replacement before taking the write lock,
            // so searches keep hitting the old index until the swap
            let (dimensions, metric) = {
                let current = index.read();
                (current.dimensions(), current.metric())
            };
            let fresh = FlatIndex::from_chunks(dimensions, metric, &chunks)?;
            fresh.save(&dir)?;
            *index.write() = fresh;
            Ok(())
        })
        .await
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.index.read().len())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "local-flat"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DistanceMetric;
    use crate::types::ChunkSource;
    use uuid::Uuid;

    fn embedded(text: &str, embedding: Vec<f32>) -> Chunk {
        let mut chunk = Chunk::new(Uuid::new_v4(), text.into(), ChunkSource::pdf("a.pdf", 1, 1), 0);
        chunk.embedding = embedding;
        chunk
    }

    #[tokio::test]
    async fn test_rebuild_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalVectorStore::new(FlatIndex::new(2, DistanceMetric::L2), dir.path().to_path_buf());

        store.insert_chunks(&[embedded("old", vec![1.0, 0.0])]).await.unwrap();
        store
            .rebuild(&[embedded("new-a", vec![0.0, 1.0]), embedded("new-b", vec![1.0, 1.0])])
            .await
            .unwrap();

        assert_eq!(store.len().await.unwrap(), 2);
        let results = store.search(&[1.0, 0.0], 3).await.unwrap();
        assert!(results.iter().all(|r| r.chunk.content != "old"));

        let reloaded = FlatIndex::load(dir.path(), 2, DistanceMetric::L2).unwrap();
        assert_eq!(reloaded.len(), 2);
    }

    #[tokio::test]
    async fn test_reset_persists_empty_index() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalVectorStore::new(FlatIndex::new(2, DistanceMetric::L2), dir.path().to_path_buf());

        store.insert_chunks(&[embedded("x", vec![1.0, 0.0])]).await.unwrap();
        assert!(!store.is_empty().await.unwrap());

        store.reset().await.unwrap();
        assert!(store.is_empty().await.unwrap());
        assert!(FlatIndex::load(dir.path(), 2, DistanceMetric::L2).unwrap().is_empty());
    }
}
