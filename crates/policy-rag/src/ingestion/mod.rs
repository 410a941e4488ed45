//! PDF ingestion: parsing, chunking and index building

mod chunker;
mod parser;
mod pipeline;

pub use chunker::TextChunker;
pub use parser::{cleanup_text, hash_bytes, PageContent, ParsedDocument, PdfParser};
pub use pipeline::{discover_pdfs, is_pdf, IngestPipeline};

#[cfg(test)]
pub(crate) use parser::test_pdf;
