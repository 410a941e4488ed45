//! In-process providers for tests

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::DistanceMetric;
use crate::error::{Error, Result};
use crate::retrieval::FlatIndex;
use crate::types::Chunk;

use super::embedding::EmbeddingProvider;
use super::llm::LlmProvider;
use super::vector_store::{VectorSearchResult, VectorStoreProvider};

/// Deterministic embedder hashing word trigrams into a unit vector
pub struct MockEmbedder {
    dimensions: usize,
    calls: AtomicUsize,
}

impl MockEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            calls: AtomicUsize::new(0),
        }
    }

    /// Embedding for `text`, without counting a call
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0; self.dimensions];
        let lower = text.to_lowercase();

        let mut word_freq: HashMap<&str, u32> = HashMap::new();
        for word in lower.split_whitespace().filter(|w| w.len() > 2) {
            *word_freq.entry(word).or_insert(0) += 1;
        }

        for (word, freq) in &word_freq {
            let chars: Vec<char> = word.chars().collect();
            for window in chars.windows(3) {
                let hash = window
                    .iter()
                    .fold(0u64, |acc, c| acc.wrapping_mul(37).wrapping_add(*c as u64));
                embedding[(hash as usize) % self.dimensions] += (*freq as f32).sqrt();
            }
            let hash = word
                .bytes()
                .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
            embedding[(hash as usize) % self.dimensions] += *freq as f32;
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut embedding {
                *v /= norm;
            }
        }
        embedding
    }

    /// Number of `embed` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.vector_for(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// In-memory cosine index
pub struct MockVectorStore {
    index: RwLock<FlatIndex>,
    reachable: bool,
}

impl MockVectorStore {
    pub fn new(dimensions: usize) -> Self {
        Self {
            index: RwLock::new(FlatIndex::new(dimensions, DistanceMetric::Cosine)),
            reachable: true,
        }
    }

    /// A store whose every call fails, like a remote index that is down
    pub fn unreachable(dimensions: usize) -> Self {
        Self {
            reachable: false,
            ..Self::new(dimensions)
        }
    }

    fn check(&self) -> Result<()> {
        if self.reachable {
            Ok(())
        } else {
            Err(Error::vector_db("mock store unreachable"))
        }
    }

    /// Store pre-embedded chunks; dimensions are taken from the first chunk
    pub fn with_chunks(chunks: Vec<Chunk>) -> Self {
        let dimensions = chunks.first().map(|c| c.embedding.len()).unwrap_or(1);
        let store = Self::new(dimensions);
        store
            .index
            .write()
            .insert(&chunks)
            .expect("mock chunks must share dimensions");
        store
    }

    /// Snapshot of the stored chunks
    pub fn chunks(&self) -> Vec<Chunk> {
        self.index.read().records().to_vec()
    }
}

#[async_trait]
impl VectorStoreProvider for MockVectorStore {
    async fn insert_chunks(&self, chunks: &[Chunk]) -> Result<()> {
        self.check()?;
        self.index.write().insert(chunks)
    }

    async fn search(&self, query_embedding: &[f32], top_k: usize) -> Result<Vec<VectorSearchResult>> {
        self.check()?;
        self.index.read().search(query_embedding, top_k)
    }

    async fn reset(&self) -> Result<()> {
        self.check()?;
        self.index.write().clear();
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        self.check()?;
        Ok(self.index.read().len())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.reachable)
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// LLM returning a fixed answer and recording the prompts it saw
pub struct MockLlm {
    answer: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl MockLlm {
    pub fn answering(answer: impl Into<String>) -> Self {
        Self {
            answer: Some(answer.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// An LLM whose every call fails
    pub fn failing() -> Self {
        Self {
            answer: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl LlmProvider for MockLlm {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().push(prompt.to_string());
        self.answer
            .clone()
            .ok_or_else(|| Error::llm("mock model unavailable"))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.answer.is_some())
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }
}
