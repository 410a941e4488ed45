//! Providers for OpenAI-compatible APIs: `/v1/embeddings` and
//! `/v1/chat/completions`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::{EmbeddingConfig, LlmConfig};
use crate::error::{Error, Result};

use super::embedding::{check_dimensions, EmbeddingProvider};
use super::http::{build_client, check_status, RetryPolicy};
use super::llm::LlmProvider;

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

impl EmbeddingsResponse {
    /// Vectors in input order
    fn into_ordered(mut self, expected: usize) -> Result<Vec<Vec<f32>>> {
        if self.data.len() != expected {
            return Err(Error::embedding(format!(
                "requested {} embeddings, received {}",
                expected,
                self.data.len()
            )));
        }
        self.data.sort_by_key(|d| d.index);
        Ok(self.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatResponse {
    fn into_text(self) -> Result<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::llm("No text in chat completion response"))
    }
}

fn missing_key(what: &str) -> Error {
    Error::Config(format!("{} requires an API key", what))
}

/// Embedding provider for OpenAI-compatible `/v1/embeddings`
pub struct OpenAiEmbedder {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    dimensions: usize,
    retry: RetryPolicy,
}

impl OpenAiEmbedder {
    /// Create a new embedder; an API key is required
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| missing_key("OpenAI embeddings"))?;
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            base_url: config.endpoint().to_string(),
            api_key,
            model: config.model.clone(),
            dimensions: config.dimensions,
            retry: RetryPolicy::new(config.max_retries),
        })
    }

    async fn embed_once(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let response = self
            .client
            .post(format!("{}/v1/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&EmbeddingsRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await?;

        let body: EmbeddingsResponse = check_status("openai", response)
            .await?
            .json()
            .await
            .map_err(|e| Error::embedding(format!("Failed to parse embeddings response: {}", e)))?;

        let embeddings = body.into_ordered(texts.len())?;
        for embedding in &embeddings {
            check_dimensions(embedding, self.dimensions)?;
        }
        Ok(embeddings)
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .pop()
            .ok_or_else(|| Error::embedding("No embedding in response"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.retry
            .run("OpenAI embedding", || self.embed_once(texts))
            .await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        let response = self
            .client
            .get(format!("{}/v1/models", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        Ok(response.status().is_success())
    }

    fn name(&self) -> &str {
        "openai"
    }
}

/// LLM provider for OpenAI-compatible chat completions
///
/// The rendered prompt is sent as a single user message.
pub struct ChatCompletionsLlm {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    retry: RetryPolicy,
}

impl ChatCompletionsLlm {
    /// Create a new chat completions provider; an API key is required
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| missing_key("Chat completions"))?;
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            base_url: config.endpoint().to_string(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            retry: RetryPolicy::new(config.max_retries),
        })
    }

    async fn generate_once(&self, prompt: &str) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&ChatRequest {
                model: &self.model,
                messages: vec![ChatMessage {
                    role: "user",
                    content: prompt,
                }],
                temperature: self.temperature,
                max_tokens: self.max_tokens,
            })
            .send()
            .await?;

        let body: ChatResponse = check_status("chat-completions", response)
            .await?
            .json()
            .await
            .map_err(|e| Error::llm(format!("Failed to parse chat response: {}", e)))?;

        body.into_text()
    }
}

#[async_trait]
impl LlmProvider for ChatCompletionsLlm {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.retry
            .run("Chat completion", || self.generate_once(prompt))
            .await
    }

    async fn health_check(&self) -> Result<bool> {
        let response = self
            .client
            .get(format!("{}/v1/models", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        Ok(response.status().is_success())
    }

    fn name(&self) -> &str {
        "chat-completions"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embeddings_reordered_by_index() {
        let body: EmbeddingsResponse = serde_json::from_str(
            r#"{"object":"list","data":[
                {"object":"embedding","index":1,"embedding":[2.0]},
                {"object":"embedding","index":0,"embedding":[1.0]}
            ]}"#,
        )
        .unwrap();
        let ordered = body.into_ordered(2).unwrap();
        assert_eq!(ordered, vec![vec![1.0], vec![2.0]]);
    }

    #[test]
    fn test_embeddings_count_mismatch() {
        let body: EmbeddingsResponse =
            serde_json::from_str(r#"{"data":[{"index":0,"embedding":[1.0]}]}"#).unwrap();
        assert!(body.into_ordered(3).is_err());
    }

    #[test]
    fn test_chat_response_text() {
        let body: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"Yes."}}]}"#,
        )
        .unwrap();
        assert_eq!(body.into_text().unwrap(), "Yes.");

        let empty: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(empty.into_text().is_err());
    }

    #[test]
    fn test_requires_api_key() {
        let config = LlmConfig {
            provider: crate::config::LlmBackend::ChatCompletions,
            ..Default::default()
        };
        assert!(matches!(
            ChatCompletionsLlm::new(&config),
            Err(Error::Config(_))
        ));
    }
}
