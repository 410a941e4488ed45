//! Question to relevant chunks: embed, search, filter

use std::sync::Arc;

use crate::error::Result;
use crate::providers::{EmbeddingProvider, VectorSearchResult, VectorStoreProvider};

/// Retrieves the chunks most relevant to a question
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStoreProvider>,
    similarity_threshold: Option<f32>,
}

impl Retriever {
    /// Create a new retriever
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStoreProvider>,
        similarity_threshold: Option<f32>,
    ) -> Self {
        Self {
            embedder,
            store,
            similarity_threshold,
        }
    }

    /// Top `top_k` chunks for `question`, best first
    pub async fn retrieve(&self, question: &str, top_k: usize) -> Result<Vec<VectorSearchResult>> {
        let query_embedding = self.embedder.embed(question).await?;
        let mut results = self.store.search(&query_embedding, top_k).await?;

        if let Some(threshold) = self.similarity_threshold {
            let before = results.len();
            results.retain(|r| r.similarity >= threshold);
            if results.len() < before {
                tracing::debug!(
                    "Dropped {} chunks below similarity {}",
                    before - results.len(),
                    threshold
                );
            }
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::mock::{MockEmbedder, MockVectorStore};
    use crate::types::{Chunk, ChunkSource};
    use uuid::Uuid;

    fn store_with(texts: &[&str], embedder: &MockEmbedder) -> Arc<MockVectorStore> {
        let chunks: Vec<Chunk> = texts
            .iter()
            .map(|t| {
                let mut c = Chunk::new(Uuid::new_v4(), t.to_string(), ChunkSource::pdf("a.pdf", 1, 1), 0);
                c.embedding = embedder.vector_for(t);
                c
            })
            .collect();
        Arc::new(MockVectorStore::with_chunks(chunks))
    }

    #[tokio::test]
    async fn test_exact_text_ranks_first() {
        let embedder = MockEmbedder::new(64);
        let store = store_with(&["pickup at 3pm", "lunch menu", "uniform policy"], &embedder);
        let retriever = Retriever::new(Arc::new(embedder), store, None);

        let results = retriever.retrieve("lunch menu", 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.content, "lunch menu");
    }

    #[tokio::test]
    async fn test_threshold_filters_results() {
        let embedder = MockEmbedder::new(64);
        let store = store_with(&["pickup at 3pm", "lunch menu"], &embedder);
        let retriever = Retriever::new(Arc::new(embedder), store, Some(0.999));

        let results = retriever.retrieve("lunch menu", 2).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.content, "lunch menu");
    }
}
