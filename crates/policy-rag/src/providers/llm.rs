//! LLM provider trait for generating answers

use async_trait::async_trait;

use crate::error::Result;

/// Trait for LLM text generation
///
/// Implementations:
/// - `OllamaLlm`: Local Ollama server (llama3.1, phi3, etc.)
/// - `ChatCompletionsLlm`: OpenAI-compatible chat completions
/// - `HostedInferenceLlm`: hosted text-generation inference endpoint
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Complete a fully rendered prompt
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}
