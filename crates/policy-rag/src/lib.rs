//! policy-rag: question answering over a folder of PDF documents
//!
//! PDFs are split into overlapping chunks, embedded and stored in a vector
//! index (an on-disk flat index or a Chroma collection). Questions are
//! answered by retrieving the closest chunks and asking a language model
//! (Ollama, an OpenAI-compatible chat API or a hosted inference endpoint)
//! to answer from that context only, citing file and page.

pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod logging;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod types;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use types::{
    document::{Chunk, ChunkSource, Document},
    query::AskRequest,
    response::{AskResponse, IngestReport, SourceRef},
};
