//! Document and chunk types with source tracking for citations

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A PDF that has been ingested
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique document ID
    pub id: Uuid,
    /// Filename inside the data directory
    pub filename: String,
    /// SHA-256 of the file bytes
    pub content_hash: String,
    /// Total number of pages
    pub total_pages: u32,
    /// Total number of chunks created
    pub total_chunks: u32,
    /// File size in bytes
    pub file_size: u64,
    /// Ingestion timestamp
    pub ingested_at: chrono::DateTime<chrono::Utc>,
}

impl Document {
    /// Create a new document record
    pub fn new(filename: String, content_hash: String, file_size: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            filename,
            content_hash,
            total_pages: 0,
            total_chunks: 0,
            file_size,
            ingested_at: chrono::Utc::now(),
        }
    }
}

/// Where a chunk came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkSource {
    /// Source filename (used in citations)
    pub filename: String,
    /// Page number (1-indexed)
    pub page_number: Option<u32>,
    /// Total pages in the document
    pub page_count: Option<u32>,
}

impl ChunkSource {
    /// Create source info for a PDF page
    pub fn pdf(filename: impl Into<String>, page: u32, total_pages: u32) -> Self {
        Self {
            filename: filename.into(),
            page_number: Some(page),
            page_count: Some(total_pages),
        }
    }
}

/// A chunk of text from a document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique chunk ID
    pub id: Uuid,
    /// Parent document ID
    pub document_id: Uuid,
    /// Text content
    pub content: String,
    /// Embedding vector, empty until embedded and never persisted with the metadata
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub embedding: Vec<f32>,
    /// Source information for citations
    pub source: ChunkSource,
    /// Chunk index within document
    pub chunk_index: u32,
}

impl Chunk {
    /// Create a new chunk
    pub fn new(document_id: Uuid, content: String, source: ChunkSource, chunk_index: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id,
            content,
            embedding: Vec::new(),
            source,
            chunk_index,
        }
    }

    /// Convert to flat metadata for stores that keep key/value pairs
    pub fn to_vector_metadata(&self) -> serde_json::Map<String, serde_json::Value> {
        let mut meta = serde_json::Map::new();
        meta.insert("document_id".to_string(), serde_json::json!(self.document_id.to_string()));
        meta.insert("source".to_string(), serde_json::json!(self.source.filename));
        meta.insert("chunk_index".to_string(), serde_json::json!(self.chunk_index));

        if let Some(page) = self.source.page_number {
            meta.insert("page".to_string(), serde_json::json!(page));
        }
        if let Some(count) = self.source.page_count {
            meta.insert("page_count".to_string(), serde_json::json!(count));
        }

        meta
    }

    /// Rebuild a chunk from stored id, text and metadata
    pub fn from_vector_metadata(
        id: &str,
        content: String,
        metadata: &serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        let id = Uuid::parse_str(id).unwrap_or_else(|_| Uuid::new_v4());

        let document_id = metadata
            .get("document_id")
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::nil);

        let filename = metadata
            .get("source")
            .and_then(|v| v.as_str())
            .unwrap_or("document")
            .to_string();

        let page_number = metadata
            .get("page")
            .and_then(|v| v.as_u64())
            .map(|p| p as u32);

        let page_count = metadata
            .get("page_count")
            .and_then(|v| v.as_u64())
            .map(|p| p as u32);

        let chunk_index = metadata
            .get("chunk_index")
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as u32;

        Self {
            id,
            document_id,
            content,
            embedding: Vec::new(),
            source: ChunkSource {
                filename,
                page_number,
                page_count,
            },
            chunk_index,
        }
    }
}
