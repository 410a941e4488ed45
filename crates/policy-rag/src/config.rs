//! Configuration for the RAG service
//!
//! Values come from three layers, later layers winning: built-in defaults,
//! an optional TOML file, and environment variables.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, Result};

/// Main RAG service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Source documents
    pub data: DataConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Vector index configuration
    pub vector_db: VectorDbConfig,
    /// Retrieval configuration
    pub retrieval: RetrievalConfig,
    /// Language model configuration
    pub llm: LlmConfig,
    /// Prompt configuration
    pub prompt: PromptConfig,
}

impl RagConfig {
    /// Load configuration from an optional TOML file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        config.apply_env_with(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))
    }

    /// Apply environment overrides using the given lookup
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(provider) = lookup("RAG_EMBED_PROVIDER") {
            self.embeddings.provider = provider.parse()?;
        }
        if let Some(provider) = lookup("RAG_LLM_PROVIDER") {
            self.llm.provider = provider.parse()?;
        }
        if let Some(url) = lookup("OLLAMA_URL") {
            if self.llm.provider == LlmBackend::Ollama {
                self.llm.base_url = Some(url.clone());
            }
            if self.embeddings.provider == EmbeddingBackend::Ollama {
                self.embeddings.base_url = Some(url);
            }
        }
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| Error::Config(format!("Invalid PORT: {}", port)))?;
        }
        if let Some(dir) = lookup("RAG_DATA_DIR") {
            self.data.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("RAG_INDEX_DIR") {
            self.vector_db.index_dir = PathBuf::from(dir);
        }
        if let Some(backend) = lookup("RAG_VECTOR_BACKEND") {
            self.vector_db.backend = backend.parse()?;
        }
        if let Some(url) = lookup("CHROMA_URL") {
            self.vector_db.chroma.url = url;
        }
        if let Some(model) = lookup("RAG_EMBED_MODEL") {
            self.embeddings.model = model;
        }
        if let Some(key) = lookup("RAG_EMBED_API_KEY").or_else(|| lookup("OPENAI_API_KEY")) {
            self.embeddings.api_key = Some(key);
        }
        if let Some(model) = lookup("RAG_LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(url) = lookup("RAG_LLM_BASE_URL") {
            self.llm.base_url = Some(url);
        }
        let llm_key = match self.llm.provider {
            LlmBackend::HostedInference => lookup("RAG_LLM_API_KEY").or_else(|| lookup("HF_API_TOKEN")),
            _ => lookup("RAG_LLM_API_KEY").or_else(|| lookup("OPENAI_API_KEY")),
        };
        if let Some(key) = llm_key {
            self.llm.api_key = Some(key);
        }

        Ok(())
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(Error::Config("chunking.chunk_size must be > 0".to_string()));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(Error::Config(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.embeddings.dimensions == 0 {
            return Err(Error::Config("embeddings.dimensions must be > 0".to_string()));
        }
        if self.embeddings.batch_size == 0 {
            return Err(Error::Config("embeddings.batch_size must be > 0".to_string()));
        }
        if self.retrieval.top_k == 0 || self.retrieval.top_k > self.retrieval.max_top_k {
            return Err(Error::Config(format!(
                "retrieval.top_k must be between 1 and max_top_k ({})",
                self.retrieval.max_top_k
            )));
        }
        if self.embeddings.provider == EmbeddingBackend::OpenAi && self.embeddings.api_key.is_none() {
            return Err(Error::Config(
                "embeddings.api_key is required for the openai embedding provider".to_string(),
            ));
        }
        if self.llm.provider != LlmBackend::Ollama && self.llm.api_key.is_none() {
            return Err(Error::Config(format!(
                "llm.api_key is required for the {} provider",
                self.llm.provider.as_str()
            )));
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum upload size in bytes (default: 50MB)
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            enable_cors: true,
            max_upload_size: 50 * 1024 * 1024,
        }
    }
}

/// Source document configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Directory scanned for PDF files
    pub data_dir: PathBuf,
    /// Build the index at startup when it is empty
    pub auto_ingest_if_empty: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            auto_ingest_if_empty: false,
        }
    }
}

/// Embedding provider selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingBackend {
    /// Local Ollama server
    #[default]
    Ollama,
    /// OpenAI-compatible embeddings API
    #[serde(rename = "openai")]
    OpenAi,
}

impl FromStr for EmbeddingBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAi),
            other => Err(Error::Config(format!("Unknown embedding provider: {}", other))),
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Embedding provider
    pub provider: EmbeddingBackend,
    /// Model to use (default: all-minilm, i.e. all-MiniLM-L6-v2)
    pub model: String,
    /// Embedding dimensions (384 for MiniLM)
    pub dimensions: usize,
    /// Provider base URL (provider default when unset)
    pub base_url: Option<String>,
    /// API key for hosted providers
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Texts per embedding request batch
    pub batch_size: usize,
    /// Concurrent embedding requests (default: CPU count, max 4)
    pub parallel_requests: Option<usize>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries for failed requests
    pub max_retries: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingBackend::Ollama,
            model: "all-minilm".to_string(),
            dimensions: 384,
            base_url: None,
            api_key: None,
            batch_size: 32,
            parallel_requests: None,
            timeout_secs: 60,
            max_retries: 2,
        }
    }
}

impl EmbeddingConfig {
    /// Base URL, falling back to the provider default
    pub fn endpoint(&self) -> &str {
        match (&self.base_url, self.provider) {
            (Some(url), _) => url.trim_end_matches('/'),
            (None, EmbeddingBackend::Ollama) => "http://localhost:11434",
            (None, EmbeddingBackend::OpenAi) => "https://api.openai.com",
        }
    }

    /// Effective request concurrency
    pub fn parallelism(&self) -> usize {
        self.parallel_requests
            .unwrap_or_else(|| num_cpus::get().min(4))
            .max(1)
    }
}

/// How text is split into chunks
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingStrategy {
    /// Split on paragraph, line, then word boundaries
    #[default]
    Recursive,
    /// Fixed-size character window
    SlidingWindow,
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Splitting strategy
    pub strategy: ChunkingStrategy,
    /// Target chunk size in characters
    pub chunk_size: usize,
    /// Overlap between chunks in characters
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            strategy: ChunkingStrategy::Recursive,
            chunk_size: 800,
            chunk_overlap: 150,
        }
    }
}

/// Vector index backend selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VectorBackend {
    /// In-process flat index persisted to disk
    #[default]
    Flat,
    /// Chroma embedding database over HTTP
    Chroma,
}

impl FromStr for VectorBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "flat" => Ok(Self::Flat),
            "chroma" => Ok(Self::Chroma),
            other => Err(Error::Config(format!("Unknown vector backend: {}", other))),
        }
    }
}

/// Distance function used for nearest-neighbour lookup
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Squared Euclidean distance
    #[default]
    L2,
    /// Cosine distance
    Cosine,
    /// Negative inner product
    InnerProduct,
}

impl DistanceMetric {
    /// Chroma `hnsw:space` name
    pub fn chroma_space(&self) -> &'static str {
        match self {
            Self::L2 => "l2",
            Self::Cosine => "cosine",
            Self::InnerProduct => "ip",
        }
    }

    /// Map a distance (lower is closer) to a similarity (higher is closer)
    pub fn similarity_from_distance(&self, distance: f32) -> f32 {
        match self {
            Self::L2 => 1.0 / (1.0 + distance.max(0.0)),
            Self::Cosine | Self::InnerProduct => 1.0 - distance,
        }
    }
}

/// Chroma connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChromaConfig {
    /// Chroma server URL
    pub url: String,
    /// Collection holding the chunks
    pub collection: String,
    /// Tenant name
    pub tenant: String,
    /// Database name
    pub database: String,
}

impl Default for ChromaConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000".to_string(),
            collection: "policies".to_string(),
            tenant: "default_tenant".to_string(),
            database: "default_database".to_string(),
        }
    }
}

/// Vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorDbConfig {
    /// Backend
    pub backend: VectorBackend,
    /// Directory for the flat index files
    pub index_dir: PathBuf,
    /// Distance metric
    pub metric: DistanceMetric,
    /// Chroma settings (used when backend = chroma)
    pub chroma: ChromaConfig,
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        Self {
            backend: VectorBackend::Flat,
            index_dir: PathBuf::from("policy_db"),
            metric: DistanceMetric::L2,
            chroma: ChromaConfig::default(),
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Chunks retrieved per question
    pub top_k: usize,
    /// Upper bound for a client-supplied top_k
    pub max_top_k: usize,
    /// Minimum similarity for a chunk to be used
    pub similarity_threshold: Option<f32>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 4,
            max_top_k: 20,
            similarity_threshold: None,
        }
    }
}

/// Language model provider selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LlmBackend {
    /// Local Ollama server
    #[default]
    Ollama,
    /// OpenAI-compatible chat completions API
    ChatCompletions,
    /// Hosted text-generation inference API
    HostedInference,
}

impl LlmBackend {
    /// Config name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::ChatCompletions => "chat_completions",
            Self::HostedInference => "hosted_inference",
        }
    }
}

impl FromStr for LlmBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "ollama" => Ok(Self::Ollama),
            "chat_completions" | "chat" | "openai" => Ok(Self::ChatCompletions),
            "hosted_inference" | "hosted" | "huggingface" => Ok(Self::HostedInference),
            other => Err(Error::Config(format!("Unknown LLM provider: {}", other))),
        }
    }
}

/// Language model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider
    pub provider: LlmBackend,
    /// Provider base URL (provider default when unset)
    pub base_url: Option<String>,
    /// Generation model name
    pub model: String,
    /// API key for hosted providers
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Temperature for generation
    pub temperature: f32,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries for failed requests
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmBackend::Ollama,
            base_url: None,
            model: "llama3.1:8b".to_string(),
            api_key: None,
            temperature: 0.2,
            max_tokens: 512,
            timeout_secs: 120,
            max_retries: 2,
        }
    }
}

impl LlmConfig {
    /// Base URL, falling back to the provider default
    pub fn endpoint(&self) -> &str {
        match (&self.base_url, self.provider) {
            (Some(url), _) => url.trim_end_matches('/'),
            (None, LlmBackend::Ollama) => "http://localhost:11434",
            (None, LlmBackend::ChatCompletions) => "https://api.openai.com",
            (None, LlmBackend::HostedInference) => "https://api-inference.huggingface.co",
        }
    }
}

/// Prompt configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// First line of the prompt
    pub persona: String,
    /// Answer returned when nothing relevant was retrieved
    pub no_context_answer: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            persona: "You are a helpful assistant for parents.".to_string(),
            no_context_answer: "I could not find any relevant information in the indexed documents."
                .to_string(),
        }
    }
}
