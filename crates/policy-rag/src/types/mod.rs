//! Core types for the RAG service

pub mod document;
pub mod query;
pub mod response;

pub use document::{Chunk, ChunkSource, Document};
pub use query::AskRequest;
pub use response::{AskResponse, IngestReport, SourceRef};
