//! One-shot ingestion binary: rebuild the index from a folder of PDFs
//!
//! Run with: cargo run -p policy-rag --bin policy-rag-ingest -- --data-dir data

use anyhow::Context;
use clap::Parser;
use policy_rag::{
    config::RagConfig,
    ingestion::IngestPipeline,
    logging,
    providers::{build_embedder, build_vector_store},
};
use std::path::PathBuf;

/// Build the vector index from the PDFs in the data directory
#[derive(Debug, Parser)]
#[command(name = "policy-rag-ingest", version, about)]
struct Args {
    /// TOML config file (defaults apply when omitted)
    #[arg(short, long, env = "RAG_CONFIG")]
    config: Option<PathBuf>,

    /// Folder holding the PDFs, overrides config
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Flat index directory, overrides config
    #[arg(long)]
    index_dir: Option<PathBuf>,

    /// Print the report as JSON instead of a summary
    #[arg(long)]
    json: bool,

    /// Log filter, overrides RUST_LOG
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init_tracing(args.log_level.as_deref())?;

    let mut config = RagConfig::load(args.config.as_deref()).context("loading configuration")?;
    if let Some(dir) = args.data_dir {
        config.data.data_dir = dir;
    }
    if let Some(dir) = args.index_dir {
        config.vector_db.index_dir = dir;
    }

    let embedder = build_embedder(&config.embeddings)?;
    if !embedder.health_check().await.unwrap_or(false) {
        tracing::warn!(
            "Embedding provider at {} is not responding",
            config.embeddings.endpoint()
        );
    }
    let store = build_vector_store(&config)?;

    let pipeline = IngestPipeline::new(&config, embedder);
    let report = pipeline
        .run(&config.data.data_dir, store.as_ref())
        .await
        .with_context(|| format!("ingesting {}", config.data.data_dir.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for doc in &report.documents {
            println!(
                "  {:<40} {:>4} pages {:>5} chunks",
                doc.filename, doc.total_pages, doc.total_chunks
            );
        }
        for err in &report.errors {
            println!("  {:<40} FAILED: {}", err.filename, err.error);
        }
        println!(
            "Indexed {} chunks from {} documents in {:.1}s into {}",
            report.total_chunks_created,
            report.documents.len(),
            report.processing_time_ms as f64 / 1000.0,
            store.name()
        );
    }

    if !report.success {
        std::process::exit(1);
    }
    Ok(())
}
