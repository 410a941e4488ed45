//! Ollama-based providers for embeddings and LLM

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::{EmbeddingConfig, LlmConfig};
use crate::error::{Error, Result};

use super::embedding::{check_dimensions, EmbeddingProvider};
use super::http::{build_client, check_status, RetryPolicy};
use super::llm::LlmProvider;

const SERVICE: &str = "ollama";

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

async fn ping(client: &Client, base_url: &str) -> Result<bool> {
    match client.get(format!("{}/api/tags", base_url)).send().await {
        Ok(response) => Ok(response.status().is_success()),
        Err(_) => Ok(false),
    }
}

/// Ollama embedding provider (all-minilm, nomic-embed-text, ...)
pub struct OllamaEmbedder {
    client: Client,
    base_url: String,
    model: String,
    dimensions: usize,
    retry: RetryPolicy,
}

impl OllamaEmbedder {
    /// Create a new Ollama embedder
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            base_url: config.endpoint().to_string(),
            model: config.model.clone(),
            dimensions: config.dimensions,
            retry: RetryPolicy::new(config.max_retries),
        })
    }

    async fn embed_once(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .client
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&EmbedRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await?;

        let body: EmbedResponse = check_status(SERVICE, response)
            .await?
            .json()
            .await
            .map_err(|e| Error::embedding(format!("Failed to parse Ollama response: {}", e)))?;

        if body.embedding.is_empty() {
            return Err(Error::embedding(format!(
                "Ollama returned an empty embedding; is '{}' an embedding model?",
                self.model
            )));
        }
        check_dimensions(&body.embedding, self.dimensions)?;
        Ok(body.embedding)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.retry
            .run("Ollama embedding", || self.embed_once(text))
            .await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        ping(&self.client, &self.base_url).await
    }

    fn name(&self) -> &str {
        SERVICE
    }
}

/// Ollama LLM provider for answer generation
pub struct OllamaLlm {
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    retry: RetryPolicy,
}

impl OllamaLlm {
    /// Create a new Ollama LLM provider
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            base_url: config.endpoint().to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            retry: RetryPolicy::new(config.max_retries),
        })
    }

    async fn generate_once(&self, prompt: &str) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&GenerateRequest {
                model: &self.model,
                prompt,
                stream: false,
                options: GenerateOptions {
                    temperature: self.temperature,
                    num_predict: self.max_tokens,
                },
            })
            .send()
            .await?;

        let body: GenerateResponse = check_status(SERVICE, response)
            .await?
            .json()
            .await
            .map_err(|e| Error::llm(format!("Failed to parse Ollama response: {}", e)))?;

        Ok(body.response)
    }
}

#[async_trait]
impl LlmProvider for OllamaLlm {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.retry
            .run("Ollama generation", || self.generate_once(prompt))
            .await
    }

    async fn health_check(&self) -> Result<bool> {
        ping(&self.client, &self.base_url).await
    }

    fn name(&self) -> &str {
        SERVICE
    }

    fn model(&self) -> &str {
        &self.model
    }
}
