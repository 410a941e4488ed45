//! Provider abstractions for embeddings, LLM and vector storage
//!
//! Trait-based so the service can switch between a local stack
//! (Ollama + flat index) and hosted backends (OpenAI-compatible APIs,
//! hosted inference, Chroma) through configuration alone.

pub mod chroma;
pub mod embedding;
pub mod hosted;
pub mod http;
pub mod llm;
pub mod local;
pub mod ollama;
pub mod openai;
pub mod vector_store;

#[cfg(test)]
pub mod mock;

use std::sync::Arc;

use crate::config::{EmbeddingBackend, EmbeddingConfig, LlmBackend, LlmConfig, RagConfig, VectorBackend};
use crate::error::Result;

pub use embedding::EmbeddingProvider;
pub use llm::LlmProvider;
pub use vector_store::{VectorSearchResult, VectorStoreProvider};

/// Build the configured embedding provider
pub fn build_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let embedder: Arc<dyn EmbeddingProvider> = match config.provider {
        EmbeddingBackend::Ollama => Arc::new(ollama::OllamaEmbedder::new(config)?),
        EmbeddingBackend::OpenAi => Arc::new(openai::OpenAiEmbedder::new(config)?),
    };
    tracing::info!(
        "Embedding provider: {} (model: {}, {} dims, {})",
        embedder.name(),
        config.model,
        config.dimensions,
        config.endpoint()
    );
    Ok(embedder)
}

/// Build the configured LLM provider
pub fn build_llm(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>> {
    let llm: Arc<dyn LlmProvider> = match config.provider {
        LlmBackend::Ollama => Arc::new(ollama::OllamaLlm::new(config)?),
        LlmBackend::ChatCompletions => Arc::new(openai::ChatCompletionsLlm::new(config)?),
        LlmBackend::HostedInference => Arc::new(hosted::HostedInferenceLlm::new(config)?),
    };
    tracing::info!(
        "LLM provider: {} (model: {}, {})",
        llm.name(),
        llm.model(),
        config.endpoint()
    );
    Ok(llm)
}

/// Build the configured vector store
pub fn build_vector_store(config: &RagConfig) -> Result<Arc<dyn VectorStoreProvider>> {
    let store: Arc<dyn VectorStoreProvider> = match config.vector_db.backend {
        VectorBackend::Flat => Arc::new(local::LocalVectorStore::from_config(config)?),
        VectorBackend::Chroma => Arc::new(chroma::ChromaVectorStore::new(
            &config.vector_db.chroma,
            config.vector_db.metric,
            config.embeddings.timeout_secs,
        )?),
    };
    tracing::info!(
        "Vector store: {} (metric: {:?})",
        store.name(),
        config.vector_db.metric
    );
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_default_providers() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RagConfig::default();
        config.vector_db.index_dir = dir.path().join("index");

        assert_eq!(build_embedder(&config.embeddings).unwrap().name(), "ollama");
        assert_eq!(build_llm(&config.llm).unwrap().model(), "llama3.1:8b");
        let store = build_vector_store(&config).unwrap();
        assert_eq!(store.name(), "local-flat");
        assert!(tokio_test::block_on(store.is_empty()).unwrap());
    }

    #[test]
    fn test_build_chroma_store() {
        let mut config = RagConfig::default();
        config.vector_db.backend = VectorBackend::Chroma;
        assert_eq!(build_vector_store(&config).unwrap().name(), "chroma");
    }

    #[test]
    fn test_hosted_llm_without_key_fails() {
        let config = LlmConfig {
            provider: LlmBackend::HostedInference,
            ..Default::default()
        };
        assert!(build_llm(&config).is_err());
    }
}
