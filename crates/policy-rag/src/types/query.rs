//! Query request types

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Body of `POST /ask`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskRequest {
    /// The question to answer
    pub question: String,

    /// Number of chunks to retrieve (server default when absent)
    #[serde(default)]
    pub top_k: Option<usize>,
}

impl AskRequest {
    /// Create a new request
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            top_k: None,
        }
    }

    /// Set the number of results to retrieve
    pub fn with_top_k(mut self, k: usize) -> Self {
        self.top_k = Some(k);
        self
    }

    /// Trimmed question, rejecting blank input
    pub fn validated_question(&self) -> Result<&str> {
        let question = self.question.trim();
        if question.is_empty() {
            return Err(Error::InvalidRequest("question must not be empty".to_string()));
        }
        Ok(question)
    }

    /// Requested top_k clamped to `[1, max]`
    pub fn effective_top_k(&self, default: usize, max: usize) -> usize {
        self.top_k.unwrap_or(default).clamp(1, max.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_question_rejected() {
        assert!(AskRequest::new("   \n").validated_question().is_err());
        assert_eq!(
            AskRequest::new("  When is pickup?  ").validated_question().unwrap(),
            "When is pickup?"
        );
    }

    #[test]
    fn test_top_k_clamped() {
        assert_eq!(AskRequest::new("q").effective_top_k(4, 20), 4);
        assert_eq!(AskRequest::new("q").with_top_k(0).effective_top_k(4, 20), 1);
        assert_eq!(AskRequest::new("q").with_top_k(100).effective_top_k(4, 20), 20);
    }

    #[test]
    fn test_deserialize_without_top_k() {
        let req: AskRequest = serde_json::from_str(r#"{"question": "hi"}"#).unwrap();
        assert_eq!(req.top_k, None);
    }
}
