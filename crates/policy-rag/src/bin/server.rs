//! RAG server binary
//!
//! Run with: cargo run -p policy-rag --bin policy-rag-server -- --config rag.toml

use anyhow::Context;
use clap::Parser;
use policy_rag::{config::RagConfig, logging, server::RagServer};
use std::path::PathBuf;

/// Question answering over PDF documents
#[derive(Debug, Parser)]
#[command(name = "policy-rag-server", version, about)]
struct Args {
    /// TOML config file (defaults apply when omitted)
    #[arg(short, long, env = "RAG_CONFIG")]
    config: Option<PathBuf>,

    /// Bind address, overrides config and HOST
    #[arg(long)]
    host: Option<String>,

    /// Port, overrides config and PORT
    #[arg(short, long)]
    port: Option<u16>,

    /// Log filter, overrides RUST_LOG (e.g. "debug" or "policy_rag=trace")
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init_tracing(args.log_level.as_deref())?;

    let mut config = RagConfig::load(args.config.as_deref()).context("loading configuration")?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    tracing::info!("Configuration loaded");
    tracing::info!("  - Data directory: {:?}", config.data.data_dir);
    tracing::info!(
        "  - Vector store: {:?} ({:?})",
        config.vector_db.backend,
        config.vector_db.metric
    );
    tracing::info!(
        "  - Embeddings: {} ({} dims)",
        config.embeddings.model,
        config.embeddings.dimensions
    );
    tracing::info!("  - LLM: {} via {}", config.llm.model, config.llm.provider.as_str());
    tracing::info!(
        "  - Chunking: {} chars, {} overlap",
        config.chunking.chunk_size,
        config.chunking.chunk_overlap
    );

    let server = RagServer::new(config).await?;
    server.check_providers().await;

    let chunks = server.state().vector_store().len().await.unwrap_or(0);
    if chunks == 0 {
        tracing::warn!("The index is empty; upload PDFs and POST /reingest, or run policy-rag-ingest");
    } else {
        tracing::info!("Serving {} indexed chunks", chunks);
    }

    server.start().await?;
    Ok(())
}
