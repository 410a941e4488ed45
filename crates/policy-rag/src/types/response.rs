//! Response types for the HTTP API

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::document::Document;
use crate::providers::vector_store::VectorSearchResult;

/// Source reference returned with an answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    /// Source filename
    pub source: String,
    /// Page number, counted from 1 (the first page is page 1)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Similarity score (higher is closer)
    pub score: f32,
}

impl From<&VectorSearchResult> for SourceRef {
    fn from(result: &VectorSearchResult) -> Self {
        Self {
            source: result.chunk.source.filename.clone(),
            page: result.chunk.source.page_number,
            score: result.similarity,
        }
    }
}

/// Response from `POST /ask`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskResponse {
    /// Generated answer
    pub answer: String,
    /// Chunks the answer was grounded on
    pub sources: Vec<SourceRef>,
}

impl AskResponse {
    /// Create a response from an answer and the retrieved chunks
    pub fn new(answer: impl Into<String>, results: &[VectorSearchResult]) -> Self {
        Self {
            answer: answer.into().trim().to_string(),
            sources: results.iter().map(SourceRef::from).collect(),
        }
    }

    /// Response for a question with no retrievable context
    pub fn not_found(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            sources: Vec::new(),
        }
    }
}

/// Document summary in ingest reports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    /// Document ID
    pub id: Uuid,
    /// Filename
    pub filename: String,
    /// Pages read
    pub total_pages: u32,
    /// Chunks created
    pub total_chunks: u32,
    /// Content hash
    pub content_hash: String,
    /// File size in bytes
    pub file_size: u64,
    /// When the file was read
    pub ingested_at: chrono::DateTime<chrono::Utc>,
}

impl From<&Document> for DocumentSummary {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id,
            filename: doc.filename.clone(),
            total_pages: doc.total_pages,
            total_chunks: doc.total_chunks,
            content_hash: doc.content_hash.clone(),
            file_size: doc.file_size,
            ingested_at: doc.ingested_at,
        }
    }
}

/// A per-file failure that did not abort the whole operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestError {
    /// Filename
    pub filename: String,
    /// Error message
    pub error: String,
}

/// Outcome of an ingestion run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestReport {
    /// True when no file failed
    pub success: bool,
    /// Ingested documents
    pub documents: Vec<DocumentSummary>,
    /// Chunks written to the index
    pub total_chunks_created: u32,
    /// Processing time
    pub processing_time_ms: u64,
    /// Files that could not be ingested
    pub errors: Vec<IngestError>,
}

/// Response from `POST /upload`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    /// True when at least one file was saved and none were rejected
    pub success: bool,
    /// Saved filenames
    pub saved: Vec<String>,
    /// Rejected files with reasons
    pub rejected: Vec<IngestError>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chunk, ChunkSource};

    #[test]
    fn test_sources_follow_retrieval_order() {
        let results: Vec<VectorSearchResult> = [("a.pdf", 1, 0.9), ("b.pdf", 4, 0.5)]
            .into_iter()
            .map(|(name, page, similarity)| VectorSearchResult {
                chunk: Chunk::new(Uuid::new_v4(), "text".into(), ChunkSource::pdf(name, page, 9), 0),
                similarity,
            })
            .collect();

        let response = AskResponse::new("  Pickup is at 3pm.\n", &results);
        assert_eq!(response.answer, "Pickup is at 3pm.");
        assert_eq!(response.sources.len(), 2);
        assert_eq!(response.sources[0].source, "a.pdf");
        assert_eq!(response.sources[1].page, Some(4));
    }

    #[test]
    fn test_source_json_shape() {
        let source = SourceRef {
            source: "a.pdf".into(),
            page: None,
            score: 0.5,
        };
        let json = serde_json::to_value(&source).unwrap();
        assert_eq!(json["source"], "a.pdf");
        assert!(json.get("page").is_none());
    }
}
