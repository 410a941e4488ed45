//! Prompt template for grounded answers

use crate::config::PromptConfig;
use crate::providers::vector_store::VectorSearchResult;

/// Prompt builder for RAG queries
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    persona: String,
}

impl PromptBuilder {
    /// Create a builder with the given opening line
    pub fn new(persona: impl Into<String>) -> Self {
        Self {
            persona: persona.into(),
        }
    }

    /// Create a builder from config
    pub fn from_config(config: &PromptConfig) -> Self {
        Self::new(config.persona.clone())
    }

    /// Chunk texts in retrieval order, separated by blank lines
    pub fn build_context(results: &[VectorSearchResult]) -> String {
        results
            .iter()
            .map(|r| r.chunk.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Build the full prompt
    pub fn build(&self, question: &str, context: &str) -> String {
        format!(
            "{persona}\n\nUse ONLY the context below.\n\nCONTEXT:\n{context}\n\nQUESTION:\n{question}\n\nANSWER:",
            persona = self.persona,
            context = context,
            question = question
        )
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::from_config(&PromptConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chunk, ChunkSource};
    use uuid::Uuid;

    fn result(text: &str) -> VectorSearchResult {
        VectorSearchResult {
            chunk: Chunk::new(Uuid::new_v4(), text.into(), ChunkSource::pdf("a.pdf", 1, 1), 0),
            similarity: 0.5,
        }
    }

    #[test]
    fn test_context_joins_chunks() {
        let context = PromptBuilder::build_context(&[result("One."), result("Two.")]);
        assert_eq!(context, "One.\n\nTwo.");
        assert_eq!(PromptBuilder::build_context(&[]), "");
    }

    #[test]
    fn test_template() {
        let prompt = PromptBuilder::default().build("When is pickup?", "Pickup is at 3pm.");
        assert_eq!(
            prompt,
            "You are a helpful assistant for parents.\n\n\
             Use ONLY the context below.\n\n\
             CONTEXT:\nPickup is at 3pm.\n\n\
             QUESTION:\nWhen is pickup?\n\n\
             ANSWER:"
        );
    }
}
