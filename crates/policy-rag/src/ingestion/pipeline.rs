//! Ingestion pipeline orchestration: discover, parse, chunk, embed, index

use futures::stream::{self, StreamExt, TryStreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use walkdir::WalkDir;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::providers::{EmbeddingProvider, VectorStoreProvider};
use crate::types::response::{DocumentSummary, IngestError};
use crate::types::{Chunk, Document, IngestReport};

use super::chunker::TextChunker;
use super::parser::PdfParser;

/// True for a `.pdf` path (any case)
pub fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// PDFs directly inside `data_dir`, sorted by name
///
/// A missing directory holds no files.
pub fn discover_pdfs(data_dir: &Path) -> Result<Vec<PathBuf>> {
    if !data_dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(data_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| Error::internal(format!("Failed to read {:?}: {}", data_dir, e)))?;
        if entry.file_type().is_file() && is_pdf(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Main ingestion pipeline
pub struct IngestPipeline {
    chunker: TextChunker,
    embedder: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    parallelism: usize,
}

impl IngestPipeline {
    /// Create a new ingestion pipeline
    pub fn new(config: &RagConfig, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            chunker: TextChunker::from_config(&config.chunking),
            embedder,
            batch_size: config.embeddings.batch_size.max(1),
            parallelism: config.embeddings.parallelism(),
        }
    }

    /// Parse and chunk one file
    pub async fn prepare_file(&self, path: &Path) -> Result<(Document, Vec<Chunk>)> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::file_parse(path.display().to_string(), "invalid file name"))?
            .to_string();

        let owned_path = path.to_path_buf();
        let parse_name = filename.clone();
        let (size, parsed) = tokio::task::spawn_blocking(move || {
            let data = std::fs::read(&owned_path)?;
            let parsed = PdfParser::parse(&parse_name, &data)?;
            Ok::<_, Error>((data.len() as u64, parsed))
        })
        .await
        .map_err(|e| Error::internal(format!("Task join error: {}", e)))??;

        let mut doc = Document::new(filename, parsed.content_hash.clone(), size);
        doc.total_pages = parsed.total_pages;

        let chunks = self.chunker.chunk_document(&doc, &parsed);
        doc.total_chunks = chunks.len() as u32;

        tracing::info!(
            "[{}] {} pages with text of {}, {} characters, {} chunks",
            doc.filename,
            parsed.pages.len(),
            doc.total_pages,
            parsed.char_count(),
            chunks.len()
        );
        Ok((doc, chunks))
    }

    /// Fill in embeddings, `batch_size` texts per request with up to
    /// `parallelism` requests in flight
    pub async fn embed_chunks(&self, chunks: &mut [Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let batches: Vec<Vec<String>> = chunks
            .chunks(self.batch_size)
            .map(|batch| batch.iter().map(|c| c.content.clone()).collect())
            .collect();
        let total_batches = batches.len();
        let start = Instant::now();

        let embedded: Vec<Vec<Vec<f32>>> = stream::iter(batches)
            .map(|texts| {
                let embedder = Arc::clone(&self.embedder);
                async move { embedder.embed_batch(&texts).await }
            })
            .buffered(self.parallelism)
            .try_collect()
            .await?;

        let embeddings: Vec<Vec<f32>> = embedded.into_iter().flatten().collect();
        if embeddings.len() != chunks.len() {
            return Err(Error::embedding(format!(
                "{} chunks but {} embeddings",
                chunks.len(),
                embeddings.len()
            )));
        }
        for (chunk, embedding) in chunks.iter_mut().zip(embeddings) {
            chunk.embedding = embedding;
        }

        tracing::info!(
            "Embedded {} chunks in {} batches ({:.1}s)",
            chunks.len(),
            total_batches,
            start.elapsed().as_secs_f64()
        );
        Ok(())
    }

    /// Ingest every PDF in `data_dir` and replace the contents of `store`
    ///
    /// Files that fail to parse are reported and skipped. When no file
    /// yields any chunk the existing index is left untouched.
    pub async fn run(&self, data_dir: &Path, store: &dyn VectorStoreProvider) -> Result<IngestReport> {
        let start = Instant::now();
        let files = discover_pdfs(data_dir)?;
        if files.is_empty() {
            return Err(Error::InvalidRequest(format!(
                "No PDF files found in {}",
                data_dir.display()
            )));
        }
        tracing::info!("Ingesting {} PDF files from {:?}", files.len(), data_dir);

        let mut report = IngestReport::default();
        let mut all_chunks = Vec::new();

        for path in &files {
            match self.prepare_file(path).await {
                Ok((doc, chunks)) => {
                    report.documents.push(DocumentSummary::from(&doc));
                    all_chunks.extend(chunks);
                }
                Err(e) => {
                    tracing::warn!("Skipping {:?}: {}", path, e);
                    report.errors.push(IngestError {
                        filename: path
                            .file_name()
                            .map(|n| n.to_string_lossy().into_owned())
                            .unwrap_or_else(|| path.display().to_string()),
                        error: e.to_string(),
                    });
                }
            }
        }

        if all_chunks.is_empty() {
            tracing::warn!("No chunks produced; keeping the existing index");
        } else {
            self.embed_chunks(&mut all_chunks).await?;
            store.rebuild(&all_chunks).await?;
        }

        report.total_chunks_created = all_chunks.len() as u32;
        report.success = report.errors.is_empty() && !all_chunks.is_empty();
        report.processing_time_ms = start.elapsed().as_millis() as u64;

        tracing::info!(
            "Ingestion finished: {} documents, {} chunks, {} errors in {}ms",
            report.documents.len(),
            report.total_chunks_created,
            report.errors.len(),
            report.processing_time_ms
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DistanceMetric;
    use crate::ingestion::test_pdf;
    use crate::providers::local::LocalVectorStore;
    use crate::providers::mock::{MockEmbedder, MockVectorStore};
    use crate::retrieval::FlatIndex;
    use crate::types::ChunkSource;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_run_indexes_pdf_pages() {
        let data = tempfile::tempdir().unwrap();
        let index_dir = tempfile::tempdir().unwrap();
        std::fs::write(
            data.path().join("handbook.pdf"),
            test_pdf(&["Pickup is at three pm", "Lunch costs two pounds"]),
        )
        .unwrap();

        let embedder = Arc::new(MockEmbedder::new(16));
        let store = LocalVectorStore::new(
            FlatIndex::new(16, DistanceMetric::L2),
            index_dir.path().to_path_buf(),
        );
        let pipeline = IngestPipeline::new(&RagConfig::default(), embedder.clone());

        let report = pipeline.run(data.path(), &store).await.unwrap();
        assert!(report.success);
        assert_eq!(report.total_chunks_created, 2);
        assert_eq!(report.documents.len(), 1);
        assert_eq!(report.documents[0].total_pages, 2);
        assert!(report.documents[0].file_size > 0);

        let results = store
            .search(&embedder.vector_for("Lunch costs two pounds"), 1)
            .await
            .unwrap();
        assert_eq!(results[0].chunk.content, "Lunch costs two pounds");
        assert_eq!(results[0].chunk.source.filename, "handbook.pdf");
        assert_eq!(results[0].chunk.source.page_number, Some(2));

        // Running again replaces the index instead of appending to it
        let report = pipeline.run(data.path(), &store).await.unwrap();
        assert!(report.success);
        assert_eq!(store.len().await.unwrap(), 2);
        let reloaded = FlatIndex::load(index_dir.path(), 16, DistanceMetric::L2).unwrap();
        assert_eq!(reloaded.len(), 2);
    }

    #[test]
    fn test_discover_pdfs_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.pdf", "a.PDF", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("c.pdf"), b"x").unwrap();

        let names: Vec<String> = discover_pdfs(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.PDF", "b.pdf"]);
    }

    #[test]
    fn test_discover_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_pdfs(&dir.path().join("missing")).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_embed_chunks_in_batches() {
        let mut config = RagConfig::default();
        config.embeddings.batch_size = 2;
        config.embeddings.parallel_requests = Some(2);
        let embedder = Arc::new(MockEmbedder::new(8));
        let pipeline = IngestPipeline::new(&config, embedder.clone());

        let mut chunks: Vec<Chunk> = (0..5)
            .map(|i| Chunk::new(Uuid::new_v4(), format!("chunk number {}", i), ChunkSource::pdf("a.pdf", 1, 1), i))
            .collect();
        pipeline.embed_chunks(&mut chunks).await.unwrap();

        assert!(chunks.iter().all(|c| c.embedding.len() == 8));
        assert_eq!(chunks[3].embedding, embedder.vector_for("chunk number 3"));
        assert_eq!(embedder.calls(), 5);
    }

    #[tokio::test]
    async fn test_run_without_pdfs_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = IngestPipeline::new(&RagConfig::default(), Arc::new(MockEmbedder::new(8)));
        let store = MockVectorStore::new(8);

        let err = pipeline.run(dir.path(), &store).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_run_reports_unreadable_files_and_keeps_index() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.pdf"), b"not really a pdf").unwrap();

        let embedder = MockEmbedder::new(8);
        let mut kept = Chunk::new(Uuid::new_v4(), "old".into(), ChunkSource::pdf("old.pdf", 1, 1), 0);
        kept.embedding = embedder.vector_for("old");
        let store = MockVectorStore::with_chunks(vec![kept]);

        let pipeline = IngestPipeline::new(&RagConfig::default(), Arc::new(embedder));
        let report = pipeline.run(dir.path(), &store).await.unwrap();

        assert!(!report.success);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].filename, "broken.pdf");
        assert_eq!(store.len().await.unwrap(), 1);
    }
}
