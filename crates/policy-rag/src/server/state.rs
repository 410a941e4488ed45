//! Application state for the RAG server

use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::generation::PromptBuilder;
use crate::ingestion::IngestPipeline;
use crate::providers::{self, EmbeddingProvider, LlmProvider, VectorStoreProvider};
use crate::retrieval::Retriever;
use crate::types::IngestReport;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: RagConfig,
    /// Embedding provider (Ollama or OpenAI-compatible)
    embedding_provider: Arc<dyn EmbeddingProvider>,
    /// LLM provider (Ollama, chat completions or hosted inference)
    llm_provider: Arc<dyn LlmProvider>,
    /// Vector store (local flat index or Chroma)
    vector_store: Arc<dyn VectorStoreProvider>,
    /// Question to chunks
    retriever: Retriever,
    /// Prompt template
    prompt: PromptBuilder,
    /// Held for the duration of a re-ingest
    ingest_lock: Mutex<()>,
    /// Outcome of the most recent ingestion run
    last_ingest: RwLock<Option<IngestReport>>,
    /// Ready state
    ready: RwLock<bool>,
}

impl AppState {
    /// Create new application state from config
    pub async fn new(config: RagConfig) -> Result<Self> {
        tracing::info!("Initializing RAG application state...");

        let embedding_provider = providers::build_embedder(&config.embeddings)?;
        let llm_provider = providers::build_llm(&config.llm)?;
        let vector_store = providers::build_vector_store(&config)?;

        let state = Self::from_parts(config, embedding_provider, llm_provider, vector_store);
        state.set_ready(false);

        if state.config().data.auto_ingest_if_empty {
            state.auto_ingest().await;
        }

        state.set_ready(true);
        Ok(state)
    }

    /// Assemble state from already-built providers
    pub fn from_parts(
        config: RagConfig,
        embedding_provider: Arc<dyn EmbeddingProvider>,
        llm_provider: Arc<dyn LlmProvider>,
        vector_store: Arc<dyn VectorStoreProvider>,
    ) -> Self {
        let retriever = Retriever::new(
            Arc::clone(&embedding_provider),
            Arc::clone(&vector_store),
            config.retrieval.similarity_threshold,
        );
        let prompt = PromptBuilder::from_config(&config.prompt);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                embedding_provider,
                llm_provider,
                vector_store,
                retriever,
                prompt,
                ingest_lock: Mutex::new(()),
                last_ingest: RwLock::new(None),
                ready: RwLock::new(true),
            }),
        }
    }

    /// Get configuration
    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    /// Get embedding provider
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.inner.embedding_provider
    }

    /// Get LLM provider
    pub fn llm_provider(&self) -> &Arc<dyn LlmProvider> {
        &self.inner.llm_provider
    }

    /// Get vector store
    pub fn vector_store(&self) -> &Arc<dyn VectorStoreProvider> {
        &self.inner.vector_store
    }

    /// Get retriever
    pub fn retriever(&self) -> &Retriever {
        &self.inner.retriever
    }

    /// Get prompt builder
    pub fn prompt(&self) -> &PromptBuilder {
        &self.inner.prompt
    }

    /// Most recent ingestion report
    pub fn last_ingest(&self) -> Option<IngestReport> {
        self.inner.last_ingest.read().clone()
    }

    /// True while a re-ingest is running
    pub fn is_ingesting(&self) -> bool {
        self.inner.ingest_lock.try_lock().is_err()
    }

    /// Rebuild the index from the data directory
    ///
    /// Only one run at a time; a concurrent call fails with `Error::Busy`.
    pub async fn reingest(&self) -> Result<IngestReport> {
        let _guard = self
            .inner
            .ingest_lock
            .try_lock()
            .map_err(|_| Error::Busy("a re-ingest is already running".to_string()))?;

        let pipeline = IngestPipeline::new(self.config(), Arc::clone(self.embedding_provider()));
        let report = pipeline
            .run(&self.config().data.data_dir, self.vector_store().as_ref())
            .await?;

        *self.inner.last_ingest.write() = Some(report.clone());
        Ok(report)
    }

    /// Ingest the data directory when the index is empty
    ///
    /// Failures are logged; the server still starts.
    pub async fn auto_ingest(&self) {
        match self.vector_store().is_empty().await {
            Ok(true) => {
                tracing::info!("Index is empty, ingesting {:?}", self.config().data.data_dir);
                if let Err(e) = self.reingest().await {
                    tracing::warn!("Initial ingestion failed: {}", e);
                }
            }
            Ok(false) => {}
            Err(e) => tracing::warn!(
                "Could not inspect the {} index, skipping initial ingestion: {}",
                self.vector_store().name(),
                e
            ),
        }
    }

    /// Check if ready
    pub fn is_ready(&self) -> bool {
        *self.inner.ready.read()
    }

    /// Set ready state
    pub fn set_ready(&self, ready: bool) {
        *self.inner.ready.write() = ready;
    }

    /// Hold the re-ingest lock as a running ingest would
    #[cfg(test)]
    pub(crate) async fn lock_ingest(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.inner.ingest_lock.lock().await
    }
}
