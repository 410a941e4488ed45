//! Hosted text-generation inference provider
//!
//! Speaks the `POST /models/{model}` protocol: the prompt goes in
//! `inputs`, the completion comes back as `[{"generated_text": ...}]`
//! (or a bare object), and failures as `{"error": ...}`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;
use crate::error::{Error, Result};

use super::http::{build_client, check_status, RetryPolicy};
use super::llm::LlmProvider;

#[derive(Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    parameters: InferenceParameters,
}

#[derive(Serialize)]
struct InferenceParameters {
    temperature: f32,
    max_new_tokens: u32,
    return_full_text: bool,
}

#[derive(Deserialize)]
struct Generation {
    generated_text: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum InferenceResponse {
    Many(Vec<Generation>),
    One(Generation),
    Failed { error: serde_json::Value },
}

impl InferenceResponse {
    fn into_text(self) -> Result<String> {
        match self {
            Self::Many(generations) => generations
                .into_iter()
                .next()
                .map(|g| g.generated_text)
                .ok_or_else(|| Error::llm("Empty inference response")),
            Self::One(generation) => Ok(generation.generated_text),
            Self::Failed { error } => {
                let message = match error {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                Err(Error::llm(format!("Inference API error: {}", message)))
            }
        }
    }
}

/// Hosted inference LLM provider
pub struct HostedInferenceLlm {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    retry: RetryPolicy,
}

impl HostedInferenceLlm {
    /// Create a new hosted inference provider; an API token is required
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| Error::Config("Hosted inference requires an API token".into()))?;
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

    fn model_url(&self) -> String {
        format!("{}/models/{}", self.base_url, self.model)
    }

    async fn generate_once(&self, prompt: &str) -> Result<String> {
        let response = self
            .client
            .post(self.model_url())
            .bearer_auth(&self.api_key)
            .json(&InferenceRequest {
                inputs: prompt,
                parameters: InferenceParameters {
                    temperature: self.temperature,
                    max_new_tokens: self.max_tokens,
                    return_full_text: false,
                },
            })
            .send()
            .await?;

        let body: InferenceResponse = check_status("hosted-inference", response)
            .await?
            .json()
            .await
            .map_err(|e| Error::llm(format!("Failed to parse inference response: {}", e)))?;

        body.into_text()
    }
}

#[async_trait]
impl LlmProvider for HostedInferenceLlm {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.retry
            .run("Hosted inference", || self.generate_once(prompt))
            .await
    }

    async fn health_check(&self) -> Result<bool> {
        // Model loading answers 503, which still means the endpoint is reachable
        let response = self
            .client
            .get(self.model_url())
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        Ok(response.status().is_success() || response.status().as_u16() == 503)
    }

    fn name(&self) -> &str {
        "hosted-inference"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> Result<String> {
        serde_json::from_str::<InferenceResponse>(body)
            .unwrap()
            .into_text()
    }

    #[test]
    fn test_list_response() {
        assert_eq!(
            parse(r#"[{"generated_text":"Lunch is provided."}]"#).unwrap(),
            "Lunch is provided."
        );
    }

    #[test]
    fn test_object_response() {
        assert_eq!(parse(r#"{"generated_text":"No."}"#).unwrap(), "No.");
    }

    #[test]
    fn test_error_response() {
        let err = parse(r#"{"error":"Model is currently loading"}"#).unwrap_err();
        assert!(err.to_string().contains("currently loading"));
        assert!(parse("[]").is_err());
    }

    #[test]
    fn test_model_url() {
        let config = LlmConfig {
            provider: crate::config::LlmBackend::HostedInference,
            model: "mistralai/Mistral-7B-Instruct-v0.2".into(),
            api_key: Some("hf_test".into()),
            ..Default::default()
        };
        let llm = HostedInferenceLlm::new(&config).unwrap();
        assert_eq!(
            llm.model_url(),
            "https://api-inference.huggingface.co/models/mistralai/Mistral-7B-Instruct-v0.2"
        );
    }
}
